//! Shader bytecode validation and module creation.

use crate::error::{GpuError, Result};
use ash::vk;

/// Check that a byte buffer can be valid SPIR-V.
///
/// Bytecode must be non-empty and a whole number of 32-bit words.
pub fn validate_bytecode(bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(GpuError::InvalidBytecodeSize(bytes.len()));
    }
    Ok(())
}

/// Convert raw bytecode to SPIR-V words, validating the length first.
pub fn bytecode_to_words(bytes: &[u8]) -> Result<Vec<u32>> {
    validate_bytecode(bytes)?;

    let words = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    Ok(words)
}

/// Create a shader module from SPIR-V words.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_shader_module(
    device: &ash::Device,
    words: &[u32],
) -> Result<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::default().code(words);

    device
        .create_shader_module(&create_info, None)
        .map_err(|e| GpuError::ShaderCompilation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bytecode_rejected() {
        assert!(matches!(
            validate_bytecode(&[]),
            Err(GpuError::InvalidBytecodeSize(0))
        ));
    }

    #[test]
    fn non_word_multiple_rejected() {
        for len in [1, 2, 3, 5, 6, 7, 1023] {
            let bytes = vec![0u8; len];
            assert!(
                matches!(validate_bytecode(&bytes), Err(GpuError::InvalidBytecodeSize(l)) if l == len)
            );
        }
    }

    #[test]
    fn word_multiples_accepted() {
        for len in [4, 8, 1024] {
            let bytes = vec![0u8; len];
            assert!(validate_bytecode(&bytes).is_ok());
        }
    }

    #[test]
    fn words_are_little_endian() {
        let bytes = [0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x01, 0x00];
        let words = bytecode_to_words(&bytes).unwrap();
        // SPIR-V magic number followed by a version word
        assert_eq!(words, vec![0x0723_0203, 0x0001_0000]);
    }
}
