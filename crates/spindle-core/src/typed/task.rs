//! TypedTask trait - 型付き task data の定義
//!
//! # 学習ポイント
//! - Associated Constants (`const NAME`)
//! - Associated Types (`type Output`)

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Binds a task function name to the shape of its data and result.
///
/// # 使用例
/// ```ignore
/// #[derive(Deserialize)]
/// struct Resize {
///     width: u32,
///     height: u32,
/// }
///
/// impl TypedTask for Resize {
///     const NAME: &'static str = "resize";
///     type Output = Vec<u8>;
/// }
/// ```
pub trait TypedTask: DeserializeOwned + Send + 'static {
    /// Registry name the handler is installed under.
    const NAME: &'static str;

    type Output: Serialize + Send + 'static;
}
