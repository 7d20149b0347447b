//! Shader bytecode file loading.

use std::path::Path;

use aether_gpu::shader::bytecode_to_words;

use crate::error::{AssetError, Result};

/// Read a compiled SPIR-V file and convert it to words.
///
/// Rejects files whose byte count is zero or not a multiple of four before
/// treating the contents as bytecode.
pub fn load_shader_words(path: &Path) -> Result<Vec<u32>> {
    let bytes = std::fs::read(path).map_err(|source| AssetError::ShaderRead {
        path: path.to_path_buf(),
        source,
    })?;

    let words = bytecode_to_words(&bytes)?;

    tracing::debug!(
        "Loaded shader {} ({} words)",
        path.display(),
        words.len()
    );

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_gpu::GpuError;

    fn temp_file(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = load_shader_words(Path::new("/nonexistent/shader.spv")).unwrap_err();
        assert!(matches!(err, AssetError::ShaderRead { .. }));
    }

    #[test]
    fn truncated_bytecode_rejected() {
        let path = temp_file("aether_truncated.spv", &[1, 2, 3]);
        let err = load_shader_words(&path).unwrap_err();
        assert!(matches!(
            err,
            AssetError::Gpu(GpuError::InvalidBytecodeSize(3))
        ));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn valid_bytecode_loads() {
        let path = temp_file("aether_valid.spv", &[0x03, 0x02, 0x23, 0x07]);
        let words = load_shader_words(&path).unwrap();
        assert_eq!(words, vec![0x0723_0203]);
        std::fs::remove_file(path).ok();
    }
}
