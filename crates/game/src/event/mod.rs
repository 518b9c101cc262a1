mod cue;

pub use cue::{Cue, CueKind, CueQueue};
