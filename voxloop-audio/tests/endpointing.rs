//! VAD classification feeding the endpointer, without a microphone.

#[cfg(feature = "vad")]
mod vad_endpointing {
    use voxloop_audio::{Endpointer, EndpointerConfig, Step, VadClassifier, VadConfig};

    const RATE: u32 = 16_000;

    fn classifier() -> VadClassifier {
        VadClassifier::new(
            &VadConfig {
                mode: 3,
                frame_ms: 20,
            },
            RATE,
        )
        .unwrap()
    }

    fn endpointer() -> Endpointer {
        Endpointer::new(&EndpointerConfig {
            frame_ms: 20,
            min_start_ms: 60,
            hangover_ms: 200,
            max_utterance_ms: 2_000,
        })
    }

    #[test]
    fn silence_never_starts_an_utterance() {
        let mut vad = classifier();
        let mut ep = endpointer();
        let frame = vec![0i16; vad.frame_len()];
        // two seconds of digital silence
        for _ in 0..100 {
            let is_speech = vad.is_speech(&frame);
            assert_eq!(ep.push(frame.clone(), is_speech), Step::Waiting);
        }
        assert!(!ep.in_speech());
        assert!(ep.finish().is_empty());
    }

    #[test]
    fn odd_sized_frames_count_as_silence() {
        let mut vad = classifier();
        assert!(!vad.is_speech(&vec![1_000i16; vad.frame_len() - 1]));
    }
}

mod typed_input {
    use voxloop_audio::LineRecognizer;
    use voxloop_core::{RecognitionError, SpeechRecognizer};

    #[tokio::test]
    async fn typed_lines_drive_turns_until_eof() {
        let mut rec = LineRecognizer::new(&b"unknown value\n"[..]);
        assert_eq!(rec.listen().await, Ok("unknown value".to_string()));
        assert_eq!(rec.listen().await, Err(RecognitionError::Closed));
    }
}
