//! Encoder argument contract.
//!
//! ```text
//! ffmpeg -hide_banner -loglevel info -nostats -progress pipe:1
//!        [-re] -i <input>
//!        -c:v libx264 -preset veryfast -b:v <vb> -maxrate <vb> -bufsize <2·vb>
//!        -vf scale=<WxH>,fps=<fps> -g <2·fps>
//!        -c:a aac -b:a <ab> -ar 44100
//!        -f flv <url>/<key>
//! ```
//!
//! `-progress pipe:1` makes ffmpeg write `key=value` blocks to stdout, each ending in
//! `progress=continue` while frames flow and `progress=end` once the input is done.

use crate::encoder::LaunchSpec;
use crate::error::LaunchError;
use crate::quality::Bitrate;

/// Builds the argument list for `spec`.
pub fn build(spec: &LaunchSpec) -> Result<Vec<String>, LaunchError> {
    if spec.input.trim().is_empty() {
        return Err(LaunchError::InvalidArguments("empty input".into()));
    }
    if spec.target.url.trim().is_empty() {
        return Err(LaunchError::InvalidArguments("empty target url".into()));
    }
    if spec.target.key.expose().trim().is_empty() {
        return Err(LaunchError::InvalidArguments("empty stream key".into()));
    }
    if spec.quality.fps == 0 {
        return Err(LaunchError::InvalidArguments("fps must be positive".into()));
    }

    let q = &spec.quality;
    let vb = q.video;
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "info", "-nostats", "-progress", "pipe:1"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    if spec.realtime {
        args.push("-re".into());
    }
    args.extend([
        "-i".into(),
        spec.input.clone(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "veryfast".into(),
        "-b:v".into(),
        vb.to_string(),
        "-maxrate".into(),
        vb.to_string(),
        "-bufsize".into(),
        Bitrate::kbps(vb.as_kbps().saturating_mul(2)).to_string(),
        "-vf".into(),
        format!("scale={},fps={}", q.resolution(), q.fps),
        "-g".into(),
        (q.fps.saturating_mul(2)).to_string(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        q.audio.to_string(),
        "-ar".into(),
        "44100".into(),
        "-f".into(),
        "flv".into(),
        spec.target.publish_url(),
    ]);
    Ok(args)
}

/// Renders a command line for logs with the stream key masked.
pub fn redacted(program: &str, args: &[String], spec: &LaunchSpec) -> String {
    let secret = spec.target.publish_url();
    let shown = spec.target.to_string();
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        if *arg == secret {
            line.push_str(&shown);
        } else {
            line.push_str(arg);
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SessionId;
    use crate::encoder::RtmpTarget;
    use crate::quality::{Quality, Tier};

    fn spec() -> LaunchSpec {
        LaunchSpec {
            session: SessionId::new(),
            input: "/media/a.mp4".into(),
            target: RtmpTarget::new("rtmp://live.example/app", "sk-live-0042"),
            quality: Quality {
                tier: Tier::P720,
                video: Bitrate::kbps(2500),
                audio: Bitrate::kbps(128),
                fps: 30,
            },
            realtime: true,
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> &'a str {
        let i = args.iter().position(|a| a == flag).unwrap();
        &args[i + 1]
    }

    #[test]
    fn contract_fields() {
        let args = build(&spec()).unwrap();
        assert_eq!(value_after(&args, "-i"), "/media/a.mp4");
        assert_eq!(value_after(&args, "-b:v"), "2500k");
        assert_eq!(value_after(&args, "-bufsize"), "5000k");
        assert_eq!(value_after(&args, "-vf"), "scale=1280x720,fps=30");
        assert_eq!(value_after(&args, "-g"), "60");
        assert_eq!(value_after(&args, "-b:a"), "128k");
        assert_eq!(value_after(&args, "-progress"), "pipe:1");
        assert_eq!(value_after(&args, "-f"), "flv");
        assert_eq!(args.last().unwrap(), "rtmp://live.example/app/sk-live-0042");
        assert!(args.iter().any(|a| a == "-re"));
    }

    #[test]
    fn non_realtime_omits_re() {
        let mut s = spec();
        s.realtime = false;
        assert!(!build(&s).unwrap().iter().any(|a| a == "-re"));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let mut s = spec();
        s.input = " ".into();
        assert!(matches!(build(&s), Err(LaunchError::InvalidArguments(_))));

        let mut s = spec();
        s.target = RtmpTarget::new("rtmp://live.example/app", "");
        assert!(matches!(build(&s), Err(LaunchError::InvalidArguments(_))));
    }

    #[test]
    fn redacted_line_hides_key() {
        let s = spec();
        let args = build(&s).unwrap();
        let line = redacted("ffmpeg", &args, &s);
        assert!(line.starts_with("ffmpeg -hide_banner"));
        assert!(!line.contains("sk-live"));
        assert!(line.ends_with("0042"));
    }
}
