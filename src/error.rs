use thiserror::Error;

use crate::analysis::AnalysisKind;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which covers every fatal condition the optimizer
/// pipeline can report.
///
/// Recoverable outcomes, such as a constant expression that fails to evaluate,
/// are modeled locally by [`crate::eval::EvalError`] and
/// [`crate::eval::ConversionError`] and never escape a pass as an [`Error`].
/// Everything listed here aborts the run, because continuing would risk an
/// unsound rewrite.
///
/// # Error Categories
///
/// ## Pipeline Configuration Errors
/// - [`Error::MissingAnalysis`] - a pass asked for an analysis nobody computed
/// - [`Error::AnalysisMismatch`] - a provider answered with the wrong fact table
///
/// ## Input Errors
/// - [`Error::Malformed`] - malformed metadata or tree structure
///
/// ## Internal Errors
/// - [`Error::GraphError`] - invalid use-def graph construction
#[derive(Error, Debug)]
pub enum Error {
    /// A pass requested an analysis that was not provided.
    ///
    /// This is a pipeline configuration bug: the scheduler computes exactly
    /// the kinds a pass declares in [`crate::compiler::TreePass::requires`].
    #[error("required analysis `{0}` was not computed for this pass")]
    MissingAnalysis(AnalysisKind),

    /// An analysis provider returned a result of a different kind than requested.
    #[error("analysis provider returned `{found}` when `{expected}` was requested")]
    AnalysisMismatch {
        /// The kind that was requested
        expected: AnalysisKind,
        /// The kind that was returned
        found: AnalysisKind,
    },

    /// The input is damaged and could not be processed.
    ///
    /// Raised for malformed metadata annotations (for example a parallelism
    /// directive that is not an `omp` pragma) and for trees that violate a
    /// structural precondition.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Use-def graph error.
    ///
    /// Raised when an edge references an occurrence that does not exist.
    #[error("{0}")]
    GraphError(String),
}
