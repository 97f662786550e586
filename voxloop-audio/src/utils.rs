//! Shared audio utilities.

#[cfg(feature = "tts")]
use std::path::{Path, PathBuf};
#[cfg(any(feature = "stt", feature = "tts"))]
use std::time::{SystemTime, UNIX_EPOCH};

/// Generate a simple unique id based on current time in nanoseconds.
/// Sufficient for naming short-lived temp files.
#[inline]
#[cfg(any(feature = "stt", feature = "tts"))]
pub(crate) fn gen_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{:x}", nanos)
}

/// Binary from `env_key` if it points at an existing file, else looked up on `PATH`.
#[cfg(feature = "tts")]
pub(crate) fn find_binary(env_key: &str, default_bin: &str) -> Option<PathBuf> {
    if let Ok(p) = std::env::var(env_key) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Some(pb);
        }
    }
    find_on_path(default_bin)
}

#[cfg(feature = "tts")]
pub(crate) fn find_on_path(bin: &str) -> Option<PathBuf> {
    if bin.contains(std::path::MAIN_SEPARATOR) {
        let p = PathBuf::from(bin);
        return if p.exists() { Some(p) } else { None };
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| Path::new(&dir).join(bin))
        .find(|candidate| candidate.is_file())
}

/// Average interleaved channels down to mono.
#[cfg(feature = "mic")]
pub(crate) fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let ch = channels as usize;
    samples
        .chunks_exact(ch)
        .map(|frame| (frame.iter().map(|&s| s as i32).sum::<i32>() / ch as i32) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(feature = "mic")]
    fn downmix_averages_stereo() {
        assert_eq!(downmix(&[100, 300, -10, 10], 2), vec![200, 0]);
        assert_eq!(downmix(&[1, 2, 3], 1), vec![1, 2, 3]);
    }

    #[test]
    #[cfg(feature = "tts")]
    fn absolute_missing_binary_is_none() {
        assert!(find_on_path("/nonexistent/voxloop/bin").is_none());
    }

    #[test]
    #[cfg(any(feature = "stt", feature = "tts"))]
    fn gen_id_is_hex() {
        assert!(gen_id().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
