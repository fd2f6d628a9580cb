use super::protocol::{ComparisonMode, ConcordanceRequest, ConcordanceResponse, LodScore};
use crate::fingerprint::{Control, Fingerprint};
use crate::utils::{Error, Result};
use crossbeam_channel::{bounded, select, Receiver};
use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How to launch the external scoring engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Deadline for the whole exchange, up to the engine's exit; `None` waits
    /// indefinitely.
    pub timeout: Option<Duration>,
}

impl EngineConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        EngineConfig {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Lifecycle of a single engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    NotStarted,
    Started,
    RequestSent,
    ResponseReceived,
    Closed,
    Failed,
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

struct Invocation<'a> {
    config: &'a EngineConfig,
    /// Every state entered so far, starting with `NotStarted`.
    states: Vec<InvocationState>,
}

impl<'a> Invocation<'a> {
    fn new(config: &'a EngineConfig) -> Self {
        Invocation {
            config,
            states: vec![InvocationState::NotStarted],
        }
    }

    fn state(&self) -> InvocationState {
        self.states
            .last()
            .copied()
            .unwrap_or(InvocationState::NotStarted)
    }

    fn advance(&mut self, next: InvocationState) {
        log::trace!(
            "Engine {}: {} -> {}",
            self.config.program.display(),
            self.state(),
            next
        );
        self.states.push(next);
    }

    fn run(&mut self, payload: Vec<u8>) -> Result<ConcordanceResponse> {
        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::Process(format!(
                    "failed to start {}: {}",
                    self.config.program.display(),
                    e
                ))
            })?;
        self.advance(InvocationState::Started);

        match self.exchange(&mut child, payload) {
            Ok(response) => {
                self.advance(InvocationState::Closed);
                Ok(response)
            }
            Err(e) => {
                // Reaping an already exited child fails harmlessly.
                let _ = child.kill();
                let _ = child.wait();
                self.advance(InvocationState::Failed);
                Err(e)
            }
        }
    }

    /// Sends the request and collects the response and exit status. With a
    /// timeout, one deadline bounds every wait: the request write, the
    /// response read and the process exit.
    fn exchange(&mut self, child: &mut Child, payload: Vec<u8>) -> Result<ConcordanceResponse> {
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (Some(mut stdin), Some(mut stdout), Some(mut stderr)) = (stdin, stdout, stderr) else {
            return Err(Error::Process("engine pipes are not available".to_string()));
        };

        let start = Instant::now();
        let deadline = self.config.timeout.map(|timeout| start + timeout);
        let timer = match deadline {
            Some(deadline) => crossbeam_channel::at(deadline),
            None => crossbeam_channel::never(),
        };

        // stdin is closed when the writer finishes, signalling end of request.
        let written = in_background(move || -> std::io::Result<()> {
            stdin.write_all(&payload)?;
            stdin.flush()
        });
        let diagnostics = in_background(move || {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text);
            text
        });
        let output = in_background(move || {
            let mut buffer = Vec::new();
            stdout.read_to_end(&mut buffer).map(|_| buffer)
        });

        match self.receive(&written, &timer, "request writer")? {
            Ok(()) => self.advance(InvocationState::RequestSent),
            // The engine may answer without consuming the whole request.
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                log::debug!("Engine closed its input early: {}", e);
                self.advance(InvocationState::RequestSent);
            }
            Err(e) => return Err(Error::Process(format!("writing request: {}", e))),
        }
        let output = self
            .receive(&output, &timer, "response reader")?
            .map_err(|e| Error::Process(format!("reading engine output: {}", e)))?;

        let status = self.wait_for_exit(child, deadline)?;
        let diagnostics = self.receive(&diagnostics, &timer, "stderr reader")?;
        for line in diagnostics.lines().filter(|l| !l.trim().is_empty()) {
            log::debug!("[engine] {}", line);
        }
        if !status.success() {
            return Err(Error::Process(format!(
                "{} exited with {}: {}",
                self.config.program.display(),
                status,
                diagnostics.trim()
            )));
        }
        log::debug!(
            "Engine answered with {} bytes in {:.2?}",
            output.len(),
            start.elapsed()
        );

        let response = ConcordanceResponse::decode(&output)?;
        self.advance(InvocationState::ResponseReceived);
        Ok(response)
    }

    /// Waits for a helper thread's result, giving up when `timer` fires.
    fn receive<T>(&self, receiver: &Receiver<T>, timer: &Receiver<Instant>, name: &str) -> Result<T> {
        select! {
            recv(receiver) -> message => message
                .map_err(|_| Error::Process(format!("engine {} thread stopped", name))),
            recv(timer) -> _ => Err(self.timed_out(name)),
        }
    }

    fn wait_for_exit(&self, child: &mut Child, deadline: Option<Instant>) -> Result<ExitStatus> {
        let waiting = |e: std::io::Error| Error::Process(format!("waiting for engine: {}", e));
        let Some(deadline) = deadline else {
            return child.wait().map_err(waiting);
        };
        loop {
            if let Some(status) = child.try_wait().map_err(waiting)? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                return Err(self.timed_out("process exit"));
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    fn timed_out(&self, stage: &str) -> Error {
        let timeout = self.config.timeout.unwrap_or_default();
        log::warn!(
            "Engine {} did not finish within {:?} (waiting on {}), terminating it",
            self.config.program.display(),
            timeout,
            stage
        );
        Error::ConcordanceTimeout(timeout)
    }
}

/// Runs `task` on its own thread; the result arrives on the returned channel.
/// A panicking task disconnects the channel.
fn in_background<T, F>(task: F) -> Receiver<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = bounded(1);
    thread::spawn(move || {
        // The receiver is gone after a timeout.
        let _ = sender.send(task());
    });
    receiver
}

/// Client of an out-of-process scoring engine. Every call launches its own
/// engine process.
#[derive(Debug, Clone)]
pub struct ConcordanceEngine {
    config: EngineConfig,
}

impl ConcordanceEngine {
    pub fn new(config: EngineConfig) -> Self {
        ConcordanceEngine { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs one request/response exchange with a fresh engine process.
    pub fn run(&self, request: &ConcordanceRequest) -> Result<ConcordanceResponse> {
        log::debug!(
            "Scoring {} observed against {} expected fingerprints ({:?})",
            request.observed_fingerprints.len(),
            request.expected_fingerprints.len(),
            request.comparison_mode
        );
        let payload = request.encode()?;
        let response = Invocation::new(&self.config).run(payload)?;

        let expected = request.expected_score_count();
        if response.lod_scores.len() != expected {
            return Err(Error::Protocol(format!(
                "expected {} LOD scores, engine returned {}",
                expected,
                response.lod_scores.len()
            )));
        }
        Ok(response)
    }

    /// LOD score of `observed` against `expected`.
    pub fn score_one_to_one(&self, observed: &Fingerprint, expected: &Fingerprint) -> Result<f64> {
        let request = ConcordanceRequest::new(
            ComparisonMode::OneToOne,
            vec![observed.clone()],
            vec![expected.clone()],
        );
        let response = self.run(&request)?;
        response
            .lod_scores
            .iter()
            .find(|score| {
                score.observed_sample == observed.sample_id
                    && score.expected_sample == expected.sample_id
            })
            .map(|score| score.lod_score)
            .ok_or_else(|| {
                Error::Protocol(format!(
                    "no score for {} against {}",
                    observed.sample_id, expected.sample_id
                ))
            })
    }

    /// LOD scores of every observed fingerprint against every expected one.
    pub fn score_matrix(
        &self,
        observed: &[Fingerprint],
        expected: &[Fingerprint],
    ) -> Result<Vec<LodScore>> {
        let request =
            ConcordanceRequest::new(ComparisonMode::Matrix, observed.to_vec(), expected.to_vec());
        Ok(self.run(&request)?.lod_scores)
    }

    /// Scores `fingerprint` against the reference fingerprint of `control`.
    pub fn score_against_control(&self, fingerprint: &Fingerprint, control: &Control) -> Result<f64> {
        let reference = control
            .reference_fingerprint
            .as_ref()
            .ok_or_else(|| Error::NoControlConfigured(control.name.clone()))?;
        self.score_one_to_one(fingerprint, reference)
    }
}
