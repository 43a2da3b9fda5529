pub mod compressor;
pub mod envelope;
pub mod snapshot;
pub mod utils;

pub use compressor::{gain_reduction_db, CompressorEngine};
pub use envelope::{ChannelEnvelope, EnvelopeCoeffs};
pub use snapshot::SharedSettings;
