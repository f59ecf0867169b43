//! Line-delimited JSON adapter for a game running in another process
//!
//! Each request is one JSON object on its own line, answered by exactly one
//! JSON line from the game:
//!
//! ```text
//! -> {"cmd":"spec"}                     <- {"observations":15,"actions":4}
//! -> {"cmd":"reset"}                    <- {"observation":[...]}
//! -> {"cmd":"step","action":"up"}       <- {"observation":[...],"reward":1.0,"done":false}
//! -> {"cmd":"score"}                    <- {"score":12.0}
//! ```
//!
//! Any response carrying an `"error"` field is reported as a protocol error.

use super::{Direction, Environment, Observation, Step};
use crate::error::EnvError;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
enum Request {
    Spec,
    Reset,
    Step { action: Direction },
    Score,
}

#[derive(Debug, Deserialize)]
struct SpecResponse {
    observations: usize,
    actions: usize,
}

#[derive(Debug, Deserialize)]
struct ResetResponse {
    observation: Observation,
}

#[derive(Debug, Deserialize)]
struct StepResponse {
    observation: Observation,
    reward: f32,
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    score: f32,
}

/// Environment speaking the JSON-lines protocol over any reader/writer pair
pub struct JsonLinesEnv<R: BufRead, W: Write> {
    reader: R,
    writer: W,
    observations: usize,
    actions: usize,
    line: String,
}

impl<R: BufRead, W: Write> JsonLinesEnv<R, W> {
    /// Connect and query the observation/action dimensions
    pub fn new(reader: R, writer: W) -> Result<Self, EnvError> {
        let mut env = Self {
            reader,
            writer,
            observations: 0,
            actions: 0,
            line: String::new(),
        };

        let spec: SpecResponse = env.call(&Request::Spec)?;
        if spec.observations == 0 || spec.actions == 0 {
            return Err(EnvError::Protocol(format!(
                "game reported empty dimensions ({} observations, {} actions)",
                spec.observations, spec.actions
            )));
        }
        env.observations = spec.observations;
        env.actions = spec.actions;
        debug!(
            observations = spec.observations,
            actions = spec.actions,
            "connected to game"
        );

        Ok(env)
    }

    /// Writer side of the connection
    pub fn writer(&self) -> &W {
        &self.writer
    }

    fn call<T: DeserializeOwned>(&mut self, request: &Request) -> Result<T, EnvError> {
        serde_json::to_writer(&mut self.writer, request)
            .map_err(|e| EnvError::Protocol(format!("cannot encode request: {e}")))?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            return Err(EnvError::Closed);
        }

        let value: serde_json::Value = serde_json::from_str(self.line.trim())
            .map_err(|e| EnvError::Protocol(format!("malformed response: {e}")))?;

        if let Some(message) = value.get("error") {
            let message = message
                .as_str()
                .map(str::to_owned)
                .unwrap_or_else(|| message.to_string());
            return Err(EnvError::Protocol(message));
        }

        serde_json::from_value(value)
            .map_err(|e| EnvError::Protocol(format!("unexpected response to {request:?}: {e}")))
    }

    fn check_observation(&self, observation: &Observation) -> Result<(), EnvError> {
        if observation.len() != self.observations {
            return Err(EnvError::Protocol(format!(
                "observation has {} values, expected {}",
                observation.len(),
                self.observations
            )));
        }
        if observation.iter().any(|v| !v.is_finite()) {
            return Err(EnvError::Protocol(
                "observation contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }
}

impl<R: BufRead, W: Write> Environment for JsonLinesEnv<R, W> {
    fn reset(&mut self) -> Result<Observation, EnvError> {
        let response: ResetResponse = self.call(&Request::Reset)?;
        self.check_observation(&response.observation)?;
        Ok(response.observation)
    }

    fn step(&mut self, action: Direction) -> Result<Step, EnvError> {
        let response: StepResponse = self.call(&Request::Step { action })?;
        self.check_observation(&response.observation)?;
        if !response.reward.is_finite() {
            return Err(EnvError::Protocol(format!(
                "non-finite reward {}",
                response.reward
            )));
        }
        Ok(Step {
            observation: response.observation,
            reward: response.reward,
            done: response.done,
        })
    }

    fn observations(&self) -> usize {
        self.observations
    }

    fn actions(&self) -> usize {
        self.actions
    }

    fn score(&mut self) -> Result<f32, EnvError> {
        let response: ScoreResponse = self.call(&Request::Score)?;
        Ok(response.score)
    }
}

/// Game process spawned as a child, driven over its stdin/stdout
///
/// The child is killed when this value is dropped.
pub struct ProcessEnv {
    child: Child,
    inner: JsonLinesEnv<BufReader<ChildStdout>, ChildStdin>,
}

impl ProcessEnv {
    /// Spawn `program` with `args` and perform the dimension handshake
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, EnvError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EnvError::Protocol("child stdin was not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EnvError::Protocol("child stdout was not captured".to_string()))?;

        let inner = match JsonLinesEnv::new(BufReader::new(stdout), stdin) {
            Ok(inner) => inner,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };

        Ok(Self { child, inner })
    }
}

impl Environment for ProcessEnv {
    fn reset(&mut self) -> Result<Observation, EnvError> {
        self.inner.reset()
    }

    fn step(&mut self, action: Direction) -> Result<Step, EnvError> {
        self.inner.step(action)
    }

    fn observations(&self) -> usize {
        self.inner.observations()
    }

    fn actions(&self) -> usize {
        self.inner.actions()
    }

    fn score(&mut self) -> Result<f32, EnvError> {
        self.inner.score()
    }
}

impl Drop for ProcessEnv {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scripted(lines: &[&str]) -> JsonLinesEnv<Cursor<Vec<u8>>, Vec<u8>> {
        let script = lines.join("\n") + "\n";
        JsonLinesEnv::new(Cursor::new(script.into_bytes()), Vec::new()).unwrap()
    }

    fn sent_lines(env: &JsonLinesEnv<Cursor<Vec<u8>>, Vec<u8>>) -> Vec<String> {
        String::from_utf8(env.writer().clone())
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn test_handshake_reads_dimensions() {
        let env = scripted(&[r#"{"observations":3,"actions":4}"#]);
        assert_eq!(env.observations(), 3);
        assert_eq!(env.actions(), 4);
        assert_eq!(sent_lines(&env), vec![r#"{"cmd":"spec"}"#]);
    }

    #[test]
    fn test_reset_step_and_score() {
        let mut env = scripted(&[
            r#"{"observations":2,"actions":4}"#,
            r#"{"observation":[0.0,1.0]}"#,
            r#"{"observation":[1.0,1.0],"reward":1.5,"done":true}"#,
            r#"{"score":7}"#,
        ]);

        assert_eq!(env.reset().unwrap(), vec![0.0, 1.0]);

        let step = env.step(Direction::Left).unwrap();
        assert_eq!(step.observation, vec![1.0, 1.0]);
        assert_eq!(step.reward, 1.5);
        assert!(step.done);

        assert_eq!(env.score().unwrap(), 7.0);

        let sent = sent_lines(&env);
        assert_eq!(sent[1], r#"{"cmd":"reset"}"#);
        assert_eq!(sent[2], r#"{"cmd":"step","action":"left"}"#);
        assert_eq!(sent[3], r#"{"cmd":"score"}"#);
    }

    #[test]
    fn test_wrong_observation_length_is_rejected() {
        let mut env = scripted(&[
            r#"{"observations":3,"actions":4}"#,
            r#"{"observation":[0.0,1.0]}"#,
        ]);

        let err = env.reset().unwrap_err();
        assert!(matches!(err, EnvError::Protocol(_)));
    }

    #[test]
    fn test_error_response_is_protocol_error() {
        let mut env = scripted(&[
            r#"{"observations":1,"actions":4}"#,
            r#"{"error":"game crashed"}"#,
        ]);

        match env.step(Direction::Up) {
            Err(EnvError::Protocol(msg)) => assert_eq!(msg, "game crashed"),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn test_closed_stream() {
        let mut env = scripted(&[r#"{"observations":1,"actions":4}"#]);
        assert!(matches!(env.reset(), Err(EnvError::Closed)));
    }

    #[test]
    fn test_empty_dimensions_rejected() {
        let script = "{\"observations\":0,\"actions\":4}\n";
        let result = JsonLinesEnv::new(Cursor::new(script.as_bytes().to_vec()), Vec::new());
        assert!(matches!(result, Err(EnvError::Protocol(_))));
    }

    #[test]
    fn test_malformed_response() {
        let mut env = scripted(&[r#"{"observations":1,"actions":4}"#, "not json"]);
        assert!(matches!(env.reset(), Err(EnvError::Protocol(_))));
    }
}
