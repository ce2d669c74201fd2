use actor_runtime::{Audio, SoundRef, Vec3};
use tracing::debug;

/// Audio sink for the headless host: every request becomes a log line.
#[derive(Debug, Default)]
pub struct LoggingAudio {
    played: u64,
}

impl LoggingAudio {
    pub fn played(&self) -> u64 {
        self.played
    }
}

impl Audio for LoggingAudio {
    fn play_sound_at(&mut self, sound: &SoundRef, position: Vec3) {
        self.played = self.played.saturating_add(1);
        debug!(
            sound = %sound,
            x = position.x,
            y = position.y,
            z = position.z,
            "sound_played"
        );
    }
}
