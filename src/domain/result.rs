//! Result type alias for Tally

use super::errors::TallyError;

/// Result type alias for Tally operations
///
/// # Examples
///
/// ```
/// use tally::domain::result::Result;
/// use tally::domain::errors::TallyError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(TallyError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, TallyError>;
