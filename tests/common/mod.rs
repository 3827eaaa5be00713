#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

/// A running `classbookd` process driven over its stdin/stdout protocol.
pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Sidecar {
    pub fn spawn() -> Self {
        Self::spawn_with_env(&[])
    }

    pub fn spawn_with_env(vars: &[(&str, &str)]) -> Self {
        let exe = env!("CARGO_BIN_EXE_classbookd");
        let mut cmd = Command::new(exe);
        cmd.env_remove("CLASSBOOKD_WORKSPACE")
            .env_remove("CLASSBOOKD_GENERATOR_CMD")
            .env_remove("CLASSBOOKD_USER_ID");
        for (k, v) in vars {
            cmd.env(k, v);
        }
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn classbookd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
        }
    }

    /// Sends one request and returns the raw response envelope.
    pub fn call(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({ "id": id, "method": method, "params": params });
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");

        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read response line");
        assert!(!line.trim().is_empty(), "empty response for {}", method);
        let value: serde_json::Value =
            serde_json::from_str(line.trim()).expect("parse response json");
        assert_eq!(value["id"].as_str(), Some(id.as_str()));
        value
    }

    /// Sends a request that must succeed and returns its `result`.
    pub fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let resp = self.call(method, params);
        assert_eq!(resp["ok"], json!(true), "{} failed: {}", method, resp);
        resp["result"].clone()
    }

    /// Sends a request that must fail and returns the error code.
    pub fn err_code(&mut self, method: &str, params: serde_json::Value) -> String {
        let resp = self.call(method, params);
        assert_eq!(resp["ok"], json!(false), "{} unexpectedly succeeded: {}", method, resp);
        resp["error"]["code"]
            .as_str()
            .expect("error code")
            .to_string()
    }

    pub fn select_workspace(&mut self, path: &Path) -> serde_json::Value {
        self.ok("workspace.select", json!({ "path": path.to_string_lossy() }))
    }

    pub fn create_student(&mut self, first: &str, last: &str) -> String {
        let res = self.ok(
            "students.create",
            json!({ "student": { "firstName": first, "lastName": last } }),
        );
        res["student"]["id"].as_str().expect("student id").to_string()
    }

    pub fn create_activity(&mut self, title: &str, subject: &str, date: &str) -> String {
        let res = self.ok(
            "activities.create",
            json!({
                "activity": {
                    "title": title,
                    "date": date,
                    "subject": subject,
                    "domain": "Calcul",
                    "difficulty": 2
                }
            }),
        );
        res["activity"]["id"].as_str().expect("activity id").to_string()
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
