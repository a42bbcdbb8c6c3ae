//! The external media collaborator and its yt-dlp implementation.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{ChildStderr, ChildStdout, Command},
    runtime::Handle,
};
use tracing::{debug, info, warn};

use crate::errors::MediaError;
use crate::model::{DownloadMode, MediaInfo, OperationRequest};
use crate::progress::{RawProgress, parse_progress_line};

/// Resolves metadata and downloads media. Calls block until yt-dlp is done.
pub trait MediaCollaborator: Send + Sync {
    fn resolve(&self, url: &str, options: &ResolveOptions) -> Result<MediaInfo, MediaError>;

    /// `on_progress` may be invoked any number of times before this returns.
    /// Yields `None` when the file was written but no info document came back.
    fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        on_progress: &mut dyn FnMut(RawProgress),
    ) -> Result<Option<MediaInfo>, MediaError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Suppress yt-dlp's own console chatter
    pub quiet: bool,
    /// Only print metadata; never fetch media
    pub skip_download: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self { quiet: true, skip_download: true }
    }
}

/// Steps yt-dlp runs after the media has been fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessor {
    /// Transcode to an audio-only file; `quality` is a bitrate in kbps
    ExtractAudio { codec: String, quality: Option<String> },
    /// Write title and artist tags into the file
    EmbedMetadata,
    /// Attach the downloaded thumbnail as cover art
    EmbedThumbnail,
}

/// How audio-only downloads are transcoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSettings {
    /// Target codec, e.g. `mp3`
    pub codec: String,
    /// Bitrate in kbps; `None` keeps yt-dlp's default
    pub quality: Option<String>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self { codec: "mp3".to_string(), quality: Some("192".to_string()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// yt-dlp output template, e.g. `downloads/%(title).200s.%(ext)s`
    pub output_template: PathBuf,
    /// yt-dlp format selector
    pub format: String,
    /// Container separate video and audio streams are merged into
    pub merge_output_format: Option<String>,
    /// Save the thumbnail next to the media so it can be embedded
    pub write_thumbnail: bool,
    /// Run in order after the download
    pub postprocessors: Vec<PostProcessor>,
    /// Suppress console chatter; progress lines are still printed
    pub quiet: bool,
}

impl DownloadOptions {
    pub fn for_request(request: &OperationRequest, output_dir: &Path, audio: &AudioSettings) -> Self {
        let output_template = output_dir.join("%(title).200s.%(ext)s");
        match request.mode {
            DownloadMode::Audio => Self {
                output_template,
                format: "bestaudio/best".to_string(),
                merge_output_format: None,
                write_thumbnail: true,
                postprocessors: vec![
                    PostProcessor::ExtractAudio {
                        codec: audio.codec.clone(),
                        quality: audio.quality.clone(),
                    },
                    PostProcessor::EmbedMetadata,
                    PostProcessor::EmbedThumbnail,
                ],
                quiet: true,
            },
            DownloadMode::Video => Self {
                output_template,
                format: match request.quality {
                    Some(q) => format!("bestvideo[height<={}]+bestaudio/best", q.max_height()),
                    None => "bestvideo+bestaudio/best".to_string(),
                },
                merge_output_format: Some("mp4".to_string()),
                write_thumbnail: true,
                postprocessors: vec![PostProcessor::EmbedThumbnail],
                quiet: true,
            },
        }
    }

    /// The output directory implied by the template.
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_template.parent().filter(|p| !p.as_os_str().is_empty())
    }

    /// yt-dlp command-line flags for these options, excluding the URL.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-f".to_owned(),
            self.format.clone(),
            "-o".to_owned(),
            self.output_template.to_string_lossy().into_owned(),
        ];
        if let Some(container) = &self.merge_output_format {
            args.push("--merge-output-format".to_owned());
            args.push(container.clone());
        }
        if self.write_thumbnail {
            args.push("--write-thumbnail".to_owned());
        }
        for pp in &self.postprocessors {
            match pp {
                PostProcessor::ExtractAudio { codec, quality } => {
                    args.push("--extract-audio".to_owned());
                    args.push("--audio-format".to_owned());
                    args.push(codec.clone());
                    if let Some(q) = quality {
                        args.push("--audio-quality".to_owned());
                        args.push(if q.chars().all(|c| c.is_ascii_digit()) { format!("{q}K") } else { q.clone() });
                    }
                }
                PostProcessor::EmbedMetadata => args.push("--embed-metadata".to_owned()),
                PostProcessor::EmbedThumbnail => args.push("--embed-thumbnail".to_owned()),
            }
        }
        if self.quiet {
            args.push("--quiet".to_owned());
            args.push("--no-warnings".to_owned());
        }
        // Progress is still reported in quiet mode; the JSON info document is
        // printed on stdout once the download has started.
        args.extend(
            [
                "--progress",
                "--newline",
                "--progress-template",
                PROGRESS_TEMPLATE,
                "--dump-json",
                "--no-simulate",
            ]
            .map(str::to_owned),
        );
        args
    }
}

const PROGRESS_TEMPLATE: &str = concat!(
    "download:ytgrab-progress:",
    "%(progress.status)s|%(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s"
);

/// Drives the `yt-dlp` executable as a child process.
pub struct YtDlp {
    program: PathBuf,
    base_args: Vec<String>,
    runtime: Handle,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>, base_args: Vec<String>, runtime: Handle) -> Self {
        Self { program: program.into(), base_args, runtime }
    }

    fn execute(&self, args: Vec<String>, on_progress: &mut dyn FnMut(RawProgress)) -> Result<String, MediaError> {
        self.runtime.block_on(self.execute_async(args, on_progress))
    }

    async fn execute_async(
        &self,
        args: Vec<String>,
        on_progress: &mut dyn FnMut(RawProgress),
    ) -> Result<String, MediaError> {
        debug!(program = %self.program.display(), ?args, "spawning yt-dlp");
        let mut child = Command::new(&self.program)
            .args(&self.base_args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MediaError::Launch {
                program: self.program.clone(),
                source,
            })?;

        let collected = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => collect_output(stdout, stderr, on_progress).await,
            _ => Err(io::Error::other("yt-dlp output pipes were not captured").into()),
        };
        let output = match collected {
            Ok(output) => output,
            Err(err) => {
                // Never report a failure while the child can still write files.
                warn!(error = %err, "lost yt-dlp output, stopping the child");
                if let Err(kill) = child.start_kill() {
                    debug!(error = %kill, "yt-dlp already exited");
                }
                child.wait().await?;
                return Err(err);
            }
        };

        let status = child.wait().await?;
        if status.success() {
            return Ok(output.payload);
        }
        Err(match output.last_error {
            Some(message) => MediaError::Extraction(message),
            None => MediaError::ExitStatus(status.code()),
        })
    }
}

/// Reads both pipes until they close, routing each line as it arrives.
async fn collect_output(
    stdout: ChildStdout,
    stderr: ChildStderr,
    on_progress: &mut dyn FnMut(RawProgress),
) -> Result<Output, MediaError> {
    let mut out_lines = LossyLines::new(stdout);
    let mut err_lines = LossyLines::new(stderr);
    let mut output = Output::default();
    let (mut out_open, mut err_open) = (true, true);
    while out_open || err_open {
        tokio::select! {
            line = out_lines.next_line(), if out_open => match line? {
                Some(line) => output.stdout_line(line, on_progress),
                None => out_open = false,
            },
            line = err_lines.next_line(), if err_open => match line? {
                Some(line) => output.stderr_line(line, on_progress),
                None => err_open = false,
            },
        }
    }
    Ok(output)
}

/// Line reader that replaces invalid UTF-8 instead of failing. yt-dlp prints
/// titles and paths in the console encoding on some platforms.
struct LossyLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LossyLines<R> {
    fn new(inner: R) -> Self {
        Self { reader: BufReader::new(inner), buf: Vec::new() }
    }

    /// Cancel safe: a partially read line stays in `buf` for the next call.
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buf).trim_end_matches(['\r', '\n']).to_owned();
        self.buf.clear();
        Ok(Some(line))
    }
}

/// What we keep from a yt-dlp run besides progress.
#[derive(Default)]
struct Output {
    payload: String,
    last_error: Option<String>,
}

impl Output {
    fn stdout_line(&mut self, line: String, on_progress: &mut dyn FnMut(RawProgress)) {
        if let Some(progress) = parse_progress_line(&line) {
            on_progress(progress);
        } else if line.trim_start().starts_with('{') {
            self.payload.push_str(&line);
            self.payload.push('\n');
        } else {
            debug!("yt-dlp> {line}");
        }
    }

    fn stderr_line(&mut self, line: String, on_progress: &mut dyn FnMut(RawProgress)) {
        if let Some(progress) = parse_progress_line(&line) {
            on_progress(progress);
        } else if let Some(message) = line.strip_prefix("ERROR:") {
            debug!("yt-dlp error> {message}");
            self.last_error = Some(message.trim().to_string());
        } else {
            debug!("yt-dlp stderr> {line}");
        }
    }
}

/// Parses the last JSON document yt-dlp printed.
fn parse_info(payload: &str) -> Result<MediaInfo, MediaError> {
    let document = payload
        .lines()
        .rev()
        .find(|l| l.trim_start().starts_with('{'))
        .ok_or(MediaError::MissingInfo)?;
    Ok(serde_json::from_str(document)?)
}

impl MediaCollaborator for YtDlp {
    fn resolve(&self, url: &str, options: &ResolveOptions) -> Result<MediaInfo, MediaError> {
        info!(%url, "resolving metadata");
        let mut args = vec!["--dump-single-json".to_owned(), "--no-playlist".to_owned()];
        if options.skip_download {
            args.push("--skip-download".to_owned());
        }
        if options.quiet {
            args.push("--quiet".to_owned());
            args.push("--no-warnings".to_owned());
        }
        args.push("--".to_owned());
        args.push(url.to_owned());
        let payload = self.execute(args, &mut |_| {})?;
        parse_info(&payload)
    }

    fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        on_progress: &mut dyn FnMut(RawProgress),
    ) -> Result<Option<MediaInfo>, MediaError> {
        if let Some(dir) = options.output_dir() {
            std::fs::create_dir_all(dir).map_err(|source| MediaError::OutputDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        info!(%url, format = %options.format, "starting download");
        let mut args = options.to_args();
        args.push("--no-playlist".to_owned());
        args.push("--".to_owned());
        args.push(url.to_owned());
        let payload = self.execute(args, on_progress)?;
        match parse_info(&payload) {
            Ok(info) => Ok(Some(info)),
            Err(MediaError::MissingInfo) => {
                debug!(%url, "download finished without an info document");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VideoQuality;
    use crate::progress::ProgressStatus;

    fn audio_request() -> OperationRequest {
        OperationRequest::new("https://youtu.be/x", DownloadMode::Audio, None)
    }

    #[test]
    fn audio_options_extract_and_embed() {
        let opts = DownloadOptions::for_request(&audio_request(), Path::new("downloads"), &AudioSettings::default());
        assert_eq!(opts.format, "bestaudio/best");
        assert_eq!(opts.output_template, Path::new("downloads").join("%(title).200s.%(ext)s"));
        assert_eq!(opts.output_dir(), Some(Path::new("downloads")));

        let args = opts.to_args();
        let joined = args.join(" ");
        assert!(joined.contains("--extract-audio --audio-format mp3 --audio-quality 192K"));
        assert!(joined.contains("--embed-metadata"));
        assert!(joined.contains("--embed-thumbnail"));
        assert!(!joined.contains("--merge-output-format"));
        let template = args.iter().position(|a| a == "--progress-template").unwrap();
        assert!(args[template + 1].starts_with(&format!("download:{}", crate::progress::PROGRESS_PREFIX)));
    }

    #[test]
    fn video_options_follow_quality_tier() {
        let req = OperationRequest::new("u", DownloadMode::Video, Some(VideoQuality::Uhd4K));
        let opts = DownloadOptions::for_request(&req, Path::new("out"), &AudioSettings::default());
        assert_eq!(opts.format, "bestvideo[height<=2160]+bestaudio/best");
        assert_eq!(opts.merge_output_format.as_deref(), Some("mp4"));

        let req = OperationRequest::new("u", DownloadMode::Video, None);
        let opts = DownloadOptions::for_request(&req, Path::new("out"), &AudioSettings::default());
        assert_eq!(opts.format, "bestvideo+bestaudio/best");
        assert!(!opts.postprocessors.iter().any(|p| matches!(p, PostProcessor::ExtractAudio { .. })));
    }

    #[test]
    fn parse_info_takes_last_document() {
        let info = parse_info("{\"title\":\"first\"}\n{\"title\":\"second\"}\n").unwrap();
        assert_eq!(info.display_title(), "second");
        assert!(matches!(parse_info(""), Err(MediaError::MissingInfo)));
        assert!(matches!(parse_info("{oops"), Err(MediaError::MalformedInfo(_))));
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        /// Stands in for yt-dlp with a shell script run through `sh -c`.
        fn fake(script: &str) -> (tokio::runtime::Runtime, YtDlp) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let ytdlp = YtDlp::new("sh", vec!["-c".to_owned(), script.to_owned(), "fake-yt-dlp".to_owned()], rt.handle().clone());
            (rt, ytdlp)
        }

        #[test]
        fn resolve_parses_stdout_json() {
            let (_rt, ytdlp) = fake(r#"echo '{"title":"Clip","duration":61,"view_count":1234}'"#);
            let info = ytdlp.resolve("https://youtu.be/x", &ResolveOptions::default()).unwrap();
            assert_eq!(info.display_title(), "Clip");
            assert_eq!(info.duration_secs(), Some(61));
            assert_eq!(info.view_count, Some(1234));
        }

        #[test]
        fn failure_surfaces_error_line() {
            let (_rt, ytdlp) = fake(
                r#"echo "ERROR: [generic] 'not a url' is not a valid URL" >&2; exit 1"#,
            );
            let err = ytdlp.resolve("not a url", &ResolveOptions::default()).unwrap_err();
            assert_eq!(err.to_string(), "[generic] 'not a url' is not a valid URL");
        }

        #[test]
        fn silent_failure_reports_exit_status() {
            let (_rt, ytdlp) = fake("exit 3");
            let err = ytdlp.resolve("u", &ResolveOptions::default()).unwrap_err();
            assert!(matches!(err, MediaError::ExitStatus(Some(3))));
        }

        #[test]
        fn missing_program_is_a_launch_error() {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let ytdlp = YtDlp::new("/nonexistent/yt-dlp", Vec::new(), rt.handle().clone());
            assert!(matches!(
                ytdlp.resolve("u", &ResolveOptions::default()),
                Err(MediaError::Launch { .. })
            ));
        }

        #[test]
        fn download_streams_progress_from_both_pipes() {
            let script = r#"
                echo 'ytgrab-progress:downloading|  10.0%|1.00MiB/s|00:09'
                echo 'ytgrab-progress:downloading|  55.5%|1.20MiB/s|00:04' >&2
                echo '[download] Destination: x.webm'
                echo 'ytgrab-progress:finished|100.0%|NA|NA'
                echo '{"title":"Song"}'
            "#;
            let (_rt, ytdlp) = fake(script);
            let dir = tempfile::tempdir().unwrap();
            let opts = DownloadOptions::for_request(&audio_request(), &dir.path().join("nested"), &AudioSettings::default());

            let mut seen = Vec::new();
            let info = ytdlp.download("u", &opts, &mut |p| seen.push(p)).unwrap().unwrap();
            assert_eq!(info.display_title(), "Song");
            assert!(dir.path().join("nested").is_dir());

            let stdout_only: Vec<_> = seen.iter().filter(|p| p.percent.as_deref() != Some("55.5%")).collect();
            assert_eq!(stdout_only.len(), 2);
            assert_eq!(stdout_only[0].percent.as_deref(), Some("10.0%"));
            assert_eq!(stdout_only[1].status, ProgressStatus::Complete);
            assert_eq!(seen.len(), 3);
        }

        #[test]
        fn invalid_utf8_output_is_decoded_lossily() {
            let (_rt, ytdlp) = fake(r#"printf 'WARNING: caf\351\n' >&2; echo '{"title":"Clip"}'"#);
            let info = ytdlp.resolve("u", &ResolveOptions::default()).unwrap();
            assert_eq!(info.display_title(), "Clip");

            let (_rt, ytdlp) = fake(r#"printf 'ERROR: caf\351 not found\n' >&2; exit 1"#);
            let err = ytdlp.resolve("u", &ResolveOptions::default()).unwrap_err();
            assert_eq!(err.to_string(), "caf\u{FFFD} not found");
        }

        #[test]
        fn download_returns_only_after_the_child_exits() {
            let dir = tempfile::tempdir().unwrap();
            let marker = dir.path().join("marker");
            let script = format!("printf 'x\\377\\n' >&2; sleep 0.3; touch '{}'", marker.display());
            let (_rt, ytdlp) = fake(&script);
            let opts = DownloadOptions::for_request(&audio_request(), dir.path(), &AudioSettings::default());

            let info = ytdlp.download("u", &opts, &mut |_| {}).unwrap();
            assert!(info.is_none());
            assert!(marker.exists());
        }
    }
}
