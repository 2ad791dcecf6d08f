mod job;
mod preset;
mod settings;

pub use job::{Job, JobId, JobStatus};
pub use preset::{
    AudioCodec, AudioFormat, AudioLanguage, AudioOnly, Container, Height, Preset, PresetError, VideoCodec
};
pub use settings::Settings;
