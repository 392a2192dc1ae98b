pub mod openai;
pub mod traits;

pub use openai::OpenAiOracle;
pub use traits::{OracleError, SynthesisOracle, invoke_with_timeout};
