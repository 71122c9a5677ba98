//! tmuxcast-core: the pure side of the recording engine.
//! Keystroke and timing models, the session timeline, and asciicast export.
//! No process or terminal IO lives here.

pub mod cast;
pub mod error;
pub mod key;
pub mod recording;
pub mod timeline;
pub mod timing;
pub mod token;

pub use cast::{CastHeader, CastMetadata, is_title_sequence, write_cast};
pub use error::{ExportError, KeyError, TimingError};
pub use key::{Key, Keystroke, KeystrokeBatch, Stroke, expand, literal_key};
pub use recording::{
    ExportReport, FailedCapture, RecordTarget, Recording, RecordingManager, RecordingScope,
    SavedCapture,
};
pub use timeline::{
    END_MARKER, Marker, MarkerId, MarkerIndex, OutputEvent, START_MARKER, Timeline, TimelineEntry,
};
pub use timing::{INSTANT_RATE, Speed, Timing};
pub use token::random_letters;
