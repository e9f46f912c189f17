//! Unit tests for cache error types

#[cfg(test)]
mod tests {
    use crate::cache::error::CacheError;
    use std::error::Error;

    #[test]
    fn test_invalid_row_error() {
        let error = CacheError::InvalidRow("file type 7".to_string());
        assert_eq!(error.to_string(), "Invalid cache row: file type 7");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked");
        let error: CacheError = io.into();
        assert!(error.to_string().contains("locked"));
    }

    #[test]
    fn test_decode_error_conversion() {
        let result: Result<(u64, usize), _> =
            bincode::decode_from_slice(&[], bincode::config::standard());
        let error: CacheError = result.unwrap_err().into();
        assert!(matches!(error, CacheError::DecodeError(_)));
        assert!(error.to_string().starts_with("Error while decoding"));
    }

    #[test]
    fn test_error_debug() {
        let error = CacheError::InvalidRow("bad".to_string());
        let debug = format!("{error:?}");
        assert!(debug.contains("InvalidRow"));
    }

    #[test]
    fn test_error_source() {
        let error = CacheError::InvalidRow("x".to_string());
        assert!(error.source().is_none());
    }
}
