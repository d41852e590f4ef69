//! Filter pipeline builder.
//!
//! Maps a [`StreamDescriptor`] plus an equalizer snapshot to the ffmpeg
//! argument vector for one transcode. Pure and deterministic: no I/O, no
//! caching, rebuilt fresh for every request.

use std::path::Path;

use crate::stream::descriptor::{EqualizerGains, MediaKind, Rotation, StreamDescriptor};

/// Offsets at or below this are treated as "from the beginning"; seeking for
/// sub-second offsets is pointless at keyframe granularity.
pub const SEEK_THRESHOLD_SECS: f64 = 0.5;

/// Audio codecs the cast receiver plays directly, eligible for stream-copy.
const STREAM_COPY_CODECS: &[&str] = &["aac", "mp3"];

/// Ordered filter clauses derived from a descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPlan {
    /// Video filter clauses, applied in order.
    pub video: Vec<String>,
    /// Audio filter clauses, applied in order.
    pub audio: Vec<String>,
}

/// Build the filter clauses for a descriptor.
pub fn build_filter_plan(descriptor: &StreamDescriptor, eq: &EqualizerGains) -> FilterPlan {
    let mut plan = FilterPlan::default();

    if descriptor.kind == MediaKind::Video {
        // 180 has no single transpose primitive; compose two quarter turns.
        match descriptor.rotation {
            Rotation::None => {}
            Rotation::Cw90 => plan.video.push("transpose=1".to_string()),
            Rotation::Cw180 => plan.video.push("transpose=2,transpose=2".to_string()),
            Rotation::Cw270 => plan.video.push("transpose=2".to_string()),
        }

        if let Some(ref subtitle) = descriptor.subtitle_path {
            plan.video
                .push(format!("subtitles='{}'", escape_subtitle_path(subtitle)));
        }
    }

    if !eq.is_flat() {
        let clauses: Vec<String> = eq
            .bands()
            .iter()
            .map(|band| {
                format!(
                    "equalizer=f={}:width_type=h:width={}:g={}",
                    band.frequency, band.width, band.gain
                )
            })
            .collect();
        plan.audio.push(clauses.join(","));
    }

    plan
}

/// Build the full ffmpeg argument vector for a transcoding session.
///
/// Output always goes to stdout (`pipe:1`); the caller wires it to the HTTP
/// response. Image descriptors never reach this builder.
pub fn build_transcode_args(descriptor: &StreamDescriptor, eq: &EqualizerGains) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
    ];

    // Coarse container-level seek; must precede the input argument.
    if descriptor.start_offset_secs > SEEK_THRESHOLD_SECS {
        args.push("-ss".to_string());
        args.push(format!("{}", descriptor.start_offset_secs));
    }

    args.push("-i".to_string());
    args.push(descriptor.source.clone());

    let plan = build_filter_plan(descriptor, eq);
    if !plan.video.is_empty() {
        args.push("-vf".to_string());
        args.push(plan.video.join(","));
    }
    if !plan.audio.is_empty() {
        args.push("-af".to_string());
        args.push(plan.audio.join(","));
    }

    match descriptor.kind {
        MediaKind::Audio => {
            if plan.audio.is_empty() && is_stream_copyable(descriptor.audio_codec_hint.as_deref())
            {
                args.push("-c:a".to_string());
                args.push("copy".to_string());
            } else {
                args.extend(["-c:a", "aac", "-ac", "2"].map(String::from));
            }
            args.extend(["-f", "adts"].map(String::from));
        }
        MediaKind::Video | MediaKind::Image => {
            // Fragmented MP4 so the receiver can start before the index exists.
            args.extend(
                [
                    "-c:v",
                    "libx264",
                    "-preset",
                    "veryfast",
                    "-tune",
                    "zerolatency",
                    "-c:a",
                    "aac",
                    "-ac",
                    "2",
                    "-f",
                    "mp4",
                    "-movflags",
                    "frag_keyframe+empty_moov",
                ]
                .map(String::from),
            );
        }
    }

    args.push("pipe:1".to_string());
    args
}

fn is_stream_copyable(codec: Option<&str>) -> bool {
    codec.is_some_and(|c| STREAM_COPY_CODECS.contains(&c))
}

/// Normalize separators and escape colons for the subtitles filter, whose
/// syntax uses colons as argument delimiters.
fn escape_subtitle_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").replace(':', "\\:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn video(source: &str) -> StreamDescriptor {
        StreamDescriptor::new(source, MediaKind::Video)
    }

    fn audio(source: &str) -> StreamDescriptor {
        StreamDescriptor::new(source, MediaKind::Audio)
    }

    fn position_of(args: &[String], needle: &str) -> usize {
        args.iter()
            .position(|a| a == needle)
            .unwrap_or_else(|| panic!("{needle} not in {args:?}"))
    }

    #[test]
    fn zero_offset_emits_no_seek_flag() {
        let args = build_transcode_args(&video("/a.mp4"), &EqualizerGains::flat());
        assert!(!args.contains(&"-ss".to_string()));
    }

    #[test]
    fn seek_flag_precedes_input() {
        let d = video("/a.mp4").with_start_offset(5.2);
        let args = build_transcode_args(&d, &EqualizerGains::flat());
        let ss = position_of(&args, "-ss");
        assert_eq!(args[ss + 1], "5.2");
        assert!(ss < position_of(&args, "-i"));
    }

    #[test]
    fn sub_threshold_offset_is_ignored() {
        let d = video("/a.mp4").with_start_offset(0.4);
        let args = build_transcode_args(&d, &EqualizerGains::flat());
        assert!(!args.contains(&"-ss".to_string()));
    }

    #[test]
    fn rotation_maps_to_transpose() {
        let cases = [
            (Rotation::None, None),
            (Rotation::Cw90, Some("transpose=1")),
            (Rotation::Cw180, Some("transpose=2,transpose=2")),
            (Rotation::Cw270, Some("transpose=2")),
        ];
        for (rotation, expected) in cases {
            let plan = build_filter_plan(
                &video("/a.mp4").with_rotation(rotation),
                &EqualizerGains::flat(),
            );
            match expected {
                Some(clause) => assert_eq!(plan.video, vec![clause.to_string()]),
                None => assert!(plan.video.is_empty()),
            }
        }
    }

    #[test]
    fn rotation_is_ignored_for_audio() {
        let plan = build_filter_plan(
            &audio("/a.mp3").with_rotation(Rotation::Cw90),
            &EqualizerGains::flat(),
        );
        assert!(plan.video.is_empty());
    }

    #[test]
    fn subtitle_colon_is_escaped() {
        let d = video("/a.mkv").with_subtitle(Some(PathBuf::from("C:\\subs\\movie.srt")));
        let plan = build_filter_plan(&d, &EqualizerGains::flat());
        assert_eq!(plan.video, vec!["subtitles='C\\:/subs/movie.srt'".to_string()]);
        // No unescaped colon outside the delimiters.
        let clause = &plan.video[0];
        for (i, c) in clause.char_indices() {
            if c == ':' {
                assert_eq!(&clause[i - 1..i], "\\", "unescaped colon in {clause}");
            }
        }
    }

    #[test]
    fn subtitle_is_ignored_for_audio() {
        let d = audio("/a.mp3").with_subtitle(Some(PathBuf::from("/subs/a.srt")));
        let plan = build_filter_plan(&d, &EqualizerGains::flat());
        assert!(plan.video.is_empty());
    }

    #[test]
    fn flat_eq_adds_no_audio_filter() {
        let plan = build_filter_plan(&video("/a.mp4"), &EqualizerGains::flat());
        assert!(plan.audio.is_empty());
    }

    #[test]
    fn nonzero_eq_emits_all_three_bands() {
        let eq = EqualizerGains::new(0, 0, 5).unwrap();
        let plan = build_filter_plan(&video("/a.mp4"), &eq);
        assert_eq!(plan.audio.len(), 1);
        let chain = &plan.audio[0];
        assert!(chain.contains("equalizer=f=64:width_type=h:width=50:g=0"));
        assert!(chain.contains("equalizer=f=1000:width_type=h:width=200:g=0"));
        assert!(chain.contains("equalizer=f=10000:width_type=h:width=2000:g=5"));
    }

    #[test]
    fn playable_audio_with_flat_eq_is_stream_copied() {
        for codec in ["aac", "mp3"] {
            let d = audio("/a.m4a").with_audio_codec_hint(Some(codec.to_string()));
            let args = build_transcode_args(&d, &EqualizerGains::flat());
            let ca = position_of(&args, "-c:a");
            assert_eq!(args[ca + 1], "copy");
            assert!(args.contains(&"adts".to_string()));
        }
    }

    #[test]
    fn nonzero_eq_disables_stream_copy() {
        let d = audio("/a.m4a").with_audio_codec_hint(Some("aac".to_string()));
        let eq = EqualizerGains::new(1, 0, 0).unwrap();
        let args = build_transcode_args(&d, &eq);
        let ca = position_of(&args, "-c:a");
        assert_eq!(args[ca + 1], "aac");
        assert!(args.contains(&"-af".to_string()));
    }

    #[test]
    fn unplayable_audio_codec_is_reencoded() {
        let d = audio("/a.flac").with_audio_codec_hint(Some("flac".to_string()));
        let args = build_transcode_args(&d, &EqualizerGains::flat());
        let ca = position_of(&args, "-c:a");
        assert_eq!(args[ca + 1], "aac");
    }

    #[test]
    fn video_uses_fragmented_mp4() {
        let args = build_transcode_args(&video("/a.mkv"), &EqualizerGains::flat());
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"zerolatency".to_string()));
        assert!(args.contains(&"frag_keyframe+empty_moov".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn builder_is_deterministic() {
        let d = video("/a.mkv")
            .with_rotation(Rotation::Cw90)
            .with_start_offset(12.0);
        let eq = EqualizerGains::new(-2, 0, 3).unwrap();
        assert_eq!(build_transcode_args(&d, &eq), build_transcode_args(&d, &eq));
    }
}
