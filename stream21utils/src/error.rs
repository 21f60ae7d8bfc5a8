//!
//! # Stream21 Error-Helper Utilities
//!
//! Record-stream cursors and tree-walkers carry position state
//! (record counts, byte offsets, nesting contexts) which belongs in every error they produce.
//! [ErrorHelper] centralizes that: implementers define `err`, and get `fail`, `unwrap` and `assert` for free.
//!
//! ```rust
//! use stream21utils::error::{ErrorHelper, Unwrapper};
//!
//! /// Example cursor, reporting its record number upon failure.
//! struct Cursor {
//!     recordnum: usize,
//! }
//! impl ErrorHelper for Cursor {
//!     type Error = String;
//!     fn err(&self, msg: impl Into<String>) -> Self::Error {
//!         format!("{} (at record #{})", msg.into(), self.recordnum)
//!     }
//! }
//! impl Cursor {
//!     fn check(&self, layer: Option<i16>) -> Result<i16, String> {
//!         self.assert(self.recordnum > 0, "Nothing read yet")?;
//!         layer.unwrapper(self, "Missing LAYER")
//!     }
//! }
//! let c = Cursor { recordnum: 3 };
//! assert_eq!(c.check(Some(5)), Ok(5));
//! assert_eq!(c.check(None), Err("Missing LAYER (at record #3)".to_string()));
//! ```
//!

///
/// # ErrorHelper
///
/// Helper trait for re-use among record cursors and tree-walkers.
/// Each implementer generally has some internal state to report upon failure,
/// which it injects in the implementation-required `err` method.
///
pub trait ErrorHelper {
    type Error;

    /// Create and return a [Self::Error] value.
    fn err(&self, msg: impl Into<String>) -> Self::Error;
    /// Return failure
    fn fail<T>(&self, msg: impl Into<String>) -> Result<T, Self::Error> {
        Err(self.err(msg))
    }
    /// Unwrap the [Option] `opt` if it is [Some], and return our error if not.
    fn unwrap<T>(&self, opt: Option<T>, msg: impl Into<String>) -> Result<T, Self::Error> {
        match opt {
            Some(val) => Ok(val),
            None => self.fail(msg),
        }
    }
    /// Assert a boolean condition. Returns through `self.fail` if it is not satisfied.
    fn assert(&self, b: bool, msg: impl Into<String>) -> Result<(), Self::Error> {
        match b {
            true => Ok(()),
            false => self.fail(msg),
        }
    }
}

///
/// # Unwrapper
///
/// Post-fix application of [`ErrorHelper`] handling to [`Option`]s and [`Result`]s.
/// Typical usage is not to implement it for new types, but to import the trait
/// and call `unwrapper` in the context of an [`ErrorHelper`].
///
pub trait Unwrapper {
    type Ok;
    fn unwrapper<H>(self, helper: &H, msg: impl Into<String>) -> Result<Self::Ok, H::Error>
    where
        H: ErrorHelper;
}

impl<T> Unwrapper for Option<T> {
    type Ok = T;
    fn unwrapper<H>(self, helper: &H, msg: impl Into<String>) -> Result<Self::Ok, H::Error>
    where
        H: ErrorHelper,
    {
        match self {
            Some(t) => Ok(t),
            None => helper.fail(msg),
        }
    }
}

/// Note the original error value is discarded, in favor of the helper's.
impl<T, E> Unwrapper for Result<T, E> {
    type Ok = T;
    fn unwrapper<H>(
        self,
        helper: &H,
        msg: impl Into<String>,
    ) -> Result<<Self as Unwrapper>::Ok, H::Error>
    where
        H: ErrorHelper,
    {
        match self {
            Ok(t) => Ok(t),
            Err(_) => helper.fail(msg),
        }
    }
}
