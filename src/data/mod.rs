//! Source data: remote readers, reference series and table decoders

pub mod ccm;
pub mod compustat;
pub mod crsp;
pub mod frame;
pub mod reference;
pub mod sources;

pub use frame::FrameReader;
pub use reference::{Granularity, ReferenceFile, ReferenceSeries};
pub use sources::{FileFormat, FileSource, MemorySource, RemoteSource};
