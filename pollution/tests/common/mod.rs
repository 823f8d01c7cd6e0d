use commonware_pollution::{config::EngineConfig, engine::command::Command};
use std::path::PathBuf;
use tempfile::TempDir;

/// A POSIX shell engine speaking the file protocol over a fixed suite.
///
/// `polluter` breaks `victim` when it runs first, `broken` always fails, `--crash` exits
/// without writing any results, and `--hang=<file>` records the input file path then sleeps.
const ENGINE: &str = r#"#!/bin/sh
input=""
output=""
results=""
hang=""
maxfail=0
for arg in "$@"; do
  case "$arg" in
    --in=*) input="${arg#*=}" ;;
    --out=*) output="${arg#*=}" ;;
    --results=*) results="${arg#*=}" ;;
    --maxfail) maxfail=1 ;;
    --crash) exit 3 ;;
    --hang=*) hang="${arg#*=}" ;;
  esac
done
if [ -n "$hang" ]; then
  printf '%s' "$input" > "$hang.tmp"
  mv "$hang.tmp" "$hang"
  exec sleep 30
fi
if [ -n "$output" ]; then
  printf 't.py::a\nt.py::polluter\nt.py::b\nt.py::victim\nt.py::broken\n' > "$output"
  exit 0
fi
polluted=0
status=0
sep=""
printf '{' > "$results"
while IFS= read -r id; do
  [ -z "$id" ] && continue
  passed=true
  case "$id" in
    *::polluter) polluted=1 ;;
    *::victim) if [ "$polluted" = 1 ]; then passed=false; fi ;;
    *::broken) passed=false ;;
  esac
  printf '%s"%s": %s' "$sep" "$id" "$passed" >> "$results"
  sep=", "
  if [ "$passed" = false ]; then
    status=1
    if [ "$maxfail" = 1 ]; then break; fi
  fi
done < "$input"
printf '}' >> "$results"
exit $status
"#;

pub struct Fixture {
    dir: TempDir,
    pub script: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("engine.sh");
        std::fs::write(&script, ENGINE).unwrap();
        Self { dir, script }
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            program: "sh".into(),
            args: vec![self.script.to_string_lossy().into_owned()],
            input_flag: "--in".into(),
            discovery_flag: "--out".into(),
            results_flag: "--results".into(),
            discovery_args: Vec::new(),
            fail_fast_args: vec!["--maxfail".into()],
        }
    }

    pub fn engine(&self) -> Command {
        Command::new(self.config(), Vec::new())
    }

    pub fn crashing_engine(&self) -> Command {
        Command::new(self.config(), vec!["--crash".into()])
    }

    /// Returns an engine that never finishes and the file it records its input file path to.
    pub fn hanging_engine(&self) -> (Command, PathBuf) {
        let log = self.dir.path().join("hang.log");
        let arg = format!("--hang={}", log.to_string_lossy());
        (Command::new(self.config(), vec![arg]), log)
    }
}
