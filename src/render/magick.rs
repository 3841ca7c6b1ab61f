use std::{
    ffi::OsString,
    io::Read as _,
    process::{Child, Command, ExitStatus, Stdio},
    time::{Duration, Instant},
};

use crate::{
    foundation::error::{MarkerError, MarkerResult},
    render::backend::{FrameRequest, MarkerRenderer},
};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Clone, Debug)]
pub struct MagickOpts {
    /// Executable to run, `convert` (ImageMagick 6) or `magick` (ImageMagick 7).
    pub program: String,
    /// Kill the process if it has not exited after this long. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for MagickOpts {
    fn default() -> Self {
        Self {
            program: "convert".to_owned(),
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

pub fn is_program_on_path(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Renders each frame with one blocking ImageMagick invocation:
///
/// ```text
/// convert <base> -fill <color> -draw "rectangle x0,top x1,bottom" <out>
/// ```
#[derive(Clone, Debug)]
pub struct MagickRenderer {
    opts: MagickOpts,
}

impl MagickRenderer {
    pub fn new(opts: MagickOpts) -> MarkerResult<Self> {
        if opts.program.trim().is_empty() {
            return Err(MarkerError::validation("magick program must not be empty"));
        }
        if opts.timeout.is_some_and(|t| t.is_zero()) {
            return Err(MarkerError::validation("magick timeout must be > 0 when set"));
        }
        if !is_program_on_path(&opts.program) {
            return Err(MarkerError::validation(format!(
                "'{}' is required for the magick backend, but was not found on PATH",
                opts.program
            )));
        }
        Ok(Self { opts })
    }

    /// Skip the PATH probe. Spawn failures then show up per frame.
    pub fn new_unchecked(opts: MagickOpts) -> Self {
        Self { opts }
    }

    pub fn opts(&self) -> &MagickOpts {
        &self.opts
    }

    pub fn draw_args(req: &FrameRequest<'_>) -> Vec<OsString> {
        let b = &req.bounds;
        vec![
            req.base_image.as_os_str().to_owned(),
            "-fill".into(),
            req.color.to_css().into(),
            "-draw".into(),
            format!("rectangle {},{} {},{}", b.x0, b.top_y, b.x1, b.bottom_y).into(),
            req.out_path.as_os_str().to_owned(),
        ]
    }
}

impl MarkerRenderer for MagickRenderer {
    fn name(&self) -> &'static str {
        "magick"
    }

    fn render_frame(&self, req: &FrameRequest<'_>) -> MarkerResult<()> {
        let frame = req.bounds.frame.0;
        let args = Self::draw_args(req);
        tracing::debug!(frame, program = %self.opts.program, ?args, "spawning");

        let mut cmd = Command::new(&self.opts.program);
        cmd.args(&args);
        run_to_completion(cmd, self.opts.timeout).map_err(|msg| {
            MarkerError::render(frame, format!("{}: {msg}", self.opts.program))
        })?;

        if !req.out_path.is_file() {
            return Err(MarkerError::render(
                frame,
                format!(
                    "{} exited successfully but '{}' was not written",
                    self.opts.program,
                    req.out_path.display()
                ),
            ));
        }
        Ok(())
    }
}

/// Run `cmd` and wait for it, killing it once `timeout` elapses.
///
/// Returns a readable reason on spawn failure, timeout or non-zero exit.
pub(crate) fn run_to_completion(mut cmd: Command, timeout: Option<Duration>) -> Result<(), String> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| format!("failed to spawn (is it installed and on PATH?): {e}"))?;

    // Drain stderr on the side so a chatty process cannot block on a full pipe.
    let stderr_reader = child.stderr.take().map(|mut stderr| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            buf
        })
    });

    let status = wait_with_timeout(&mut child, timeout)
        .map_err(|e| format!("failed to wait for process: {e}"))?;
    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    match status {
        None => Err(format!(
            "timed out after {:.1}s",
            timeout.unwrap_or_default().as_secs_f64()
        )),
        Some(status) if !status.success() => {
            let stderr = stderr.trim();
            if stderr.is_empty() {
                Err(format!("exited with status {status}"))
            } else {
                Err(format!("exited with status {status}: {stderr}"))
            }
        }
        Some(_) => Ok(()),
    }
}

fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
) -> std::io::Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}
