use super::{CheckDetails, FieldValue, OcrError, OcrGateway, ScanRequest, ScanResults};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs an external OCR program per scan.
///
/// The PNG goes to the program's stdin; it must print a JSON object mapping
/// backend names to `{ "routingNumber", "accountNumber", "checkNumber" }`.
/// The request id is passed in the `MICRCAM_REQUEST_ID` environment variable.
/// A program still running after the timeout is killed.
pub struct CommandGateway {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDetails {
    #[serde(default)]
    routing_number: Option<String>,
    #[serde(default)]
    account_number: Option<String>,
    #[serde(default)]
    check_number: Option<String>,
}

impl From<RawDetails> for CheckDetails {
    fn from(raw: RawDetails) -> Self {
        Self {
            routing_number: FieldValue::from_raw(raw.routing_number.as_deref()),
            account_number: FieldValue::from_raw(raw.account_number.as_deref()),
            check_number: FieldValue::from_raw(raw.check_number.as_deref()),
        }
    }
}

impl CommandGateway {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Split a whitespace-separated command line into program and arguments.
    pub fn from_command_line(command_line: &str) -> Result<Self, OcrError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| OcrError::Gateway("empty OCR command".into()))?;
        Ok(Self::new(program, parts.collect()))
    }
}

/// Parse the program's JSON output.
pub(crate) fn parse_response(stdout: &[u8]) -> Result<ScanResults, OcrError> {
    let raw: BTreeMap<String, RawDetails> =
        serde_json::from_slice(stdout).map_err(|e| OcrError::Response(e.to_string()))?;
    Ok(raw
        .into_iter()
        .map(|(backend, details)| (backend, details.into()))
        .collect())
}

/// Wait for the child until the deadline. `None` means it is still running.
fn wait_until(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Read a child pipe to the end on its own thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join<T>(handle: JoinHandle<io::Result<T>>, what: &str) -> Result<T, OcrError> {
    handle
        .join()
        .map_err(|_| OcrError::Gateway(format!("{what} thread panicked")))?
        .map_err(OcrError::from)
}

impl OcrGateway for CommandGateway {
    fn scan(&mut self, request: &ScanRequest) -> Result<ScanResults, OcrError> {
        let deadline = Instant::now() + self.timeout;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("MICRCAM_REQUEST_ID", &request.id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Each pipe gets its own thread; none may wait on another.
        let stdin = child.stdin.take();
        let png = request.png.clone();
        let writer = thread::spawn(move || -> io::Result<()> {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(&png) {
                    // The engine may stop reading once it has what it needs.
                    Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {}
                    other => other?,
                }
            }
            Ok(())
        });
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let Some(status) = wait_until(&mut child, deadline)? else {
            tracing::warn!(program = %self.program, timeout = ?self.timeout, "killing OCR engine");
            // Pipe threads are left detached: a grandchild may still hold the pipes open.
            let _ = child.kill();
            let _ = child.wait();
            return Err(OcrError::Timeout(self.timeout));
        };

        join(writer, "stdin writer")?;
        let stdout = join(stdout, "stdout reader")?;
        let stderr = join(stderr, "stderr reader")?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(OcrError::Gateway(format!(
                "{} exited with {}: {}",
                self.program,
                status,
                stderr.trim()
            )));
        }
        parse_response(&stdout)
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_results() {
        let json = br#"{
            "tesseract": {"routingNumber": "124003116", "accountNumber": "1062296907", "checkNumber": "1103"},
            "opencv": {"routingNumber": "124003116", "checkNumber": ""}
        }"#;
        let results = parse_response(json).unwrap();
        assert_eq!(results["tesseract"].check_number.as_str(), "1103");
        assert_eq!(results["opencv"].account_number, FieldValue::NotFound);
        assert_eq!(results["opencv"].check_number, FieldValue::NotFound);
    }

    #[test]
    fn malformed_output_is_a_response_error() {
        let err = parse_response(b"MICR: 124003116").unwrap_err();
        assert!(matches!(err, OcrError::Response(_)));
    }

    #[test]
    fn command_line_is_split_on_whitespace() {
        let gateway = CommandGateway::from_command_line("  micr-ocr --format json ").unwrap();
        assert_eq!(gateway.name(), "micr-ocr");
        assert_eq!(gateway.args, vec!["--format", "json"]);
        assert!(CommandGateway::from_command_line("   ").is_err());
    }

    #[test]
    fn missing_program_is_an_io_error() {
        let mut gateway = CommandGateway::new("/nonexistent/micr-ocr", Vec::new());
        let request = ScanRequest {
            id: "checkImage".into(),
            png: vec![0x89, b'P', b'N', b'G'],
        };
        assert!(matches!(gateway.scan(&request), Err(OcrError::Io(_))));
    }

    #[cfg(unix)]
    #[test]
    fn runs_the_program_and_reads_its_output() {
        let script = r#"cat > /dev/null; echo "{\"tesseract\": {\"routingNumber\": \"$MICRCAM_REQUEST_ID\"}}""#;
        let mut gateway = CommandGateway::new("sh", vec!["-c".into(), script.into()]);
        let request = ScanRequest {
            id: "checkImage".into(),
            png: vec![1, 2, 3],
        };
        let results = gateway.scan(&request).unwrap();
        assert_eq!(results["tesseract"].routing_number.as_str(), "checkImage");
        assert_eq!(results["tesseract"].check_number, FieldValue::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn hung_program_is_killed_at_the_timeout() {
        let mut gateway = CommandGateway::new("sh", vec!["-c".into(), "cat > /dev/null; sleep 30".into()])
            .with_timeout(Duration::from_millis(300));
        let request = ScanRequest {
            id: "checkImage".into(),
            png: vec![1, 2, 3],
        };
        let started = Instant::now();
        assert!(matches!(gateway.scan(&request), Err(OcrError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn noisy_stderr_does_not_stall_a_large_request() {
        // Fills the stderr pipe before reading any of stdin.
        let script = "head -c 262144 /dev/zero >&2; cat > /dev/null; echo '{}'";
        let mut gateway = CommandGateway::new("sh", vec!["-c".into(), script.into()])
            .with_timeout(Duration::from_secs(10));
        let request = ScanRequest {
            id: "checkImage".into(),
            png: vec![7; 512 * 1024],
        };
        let results = gateway.scan(&request).unwrap();
        assert!(results.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn failing_program_is_a_gateway_error() {
        let mut gateway = CommandGateway::new("sh", vec!["-c".into(), "cat > /dev/null; exit 3".into()]);
        let request = ScanRequest {
            id: "checkImage".into(),
            png: vec![1, 2, 3],
        };
        assert!(matches!(gateway.scan(&request), Err(OcrError::Gateway(_))));
    }
}
