use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Replay a WAV file instead of capturing from a microphone
    #[arg(long, value_name = "PATH")]
    pub wav: Option<PathBuf>,

    /// Consume the WAV file as fast as possible instead of in real time
    #[arg(long, default_value_t = false, requires = "wav")]
    pub fast: bool,

    /// Input device name (overrides the saved preference)
    #[arg(long)]
    pub device: Option<String>,

    /// Path to the settings JSON (defaults to the platform data directory)
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Write the effective settings back to the settings file
    #[arg(long, default_value_t = false)]
    pub save_settings: bool,

    /// Print available input devices and exit
    #[arg(long, default_value_t = false)]
    pub list_devices: bool,

    /// Print the generated course and exit
    #[arg(long, default_value_t = false)]
    pub show_course: bool,

    /// Emit every event as a JSON line on stdout
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Stop as soon as the finish line is crossed
    #[arg(long, default_value_t = false)]
    pub exit_on_finish: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wav_replay_flags() {
        let args = Args::try_parse_from(["voxgate", "--wav", "take.wav", "--fast", "--json"])
            .expect("parse");
        assert_eq!(args.wav, Some(PathBuf::from("take.wav")));
        assert!(args.fast);
        assert!(args.json);
        assert!(!args.list_devices);
    }

    #[test]
    fn fast_requires_a_wav_file() {
        assert!(Args::try_parse_from(["voxgate", "--fast"]).is_err());
    }
}
