//! Scripted fake host for workflow tests
//!
//! Records every command with whether elevation was requested, answers
//! from substring rules (first match wins)
//! and emulates the handful of file commands the runner helpers issue
//! (`test -e`, `test -f`, `cat`, `tee`, `tee -a`, `cp`, `mkdir -p`, `rm -rf`).
//! Anything else succeeds with empty output.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use workflow::{CommandOutput, CommandRunner, RunOptions};

pub struct FakeHost {
    rules: Vec<(String, CommandOutput)>,
    files: RefCell<BTreeMap<String, String>>,
    dirs: RefCell<BTreeSet<String>>,
    log: RefCell<Vec<(String, bool)>>,
    privileged: bool,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            files: RefCell::new(BTreeMap::new()),
            dirs: RefCell::new(BTreeSet::new()),
            log: RefCell::new(Vec::new()),
            privileged: true,
        }
    }

    /// Answer commands containing `pattern` with `stdout`
    pub fn on(mut self, pattern: &str, stdout: &str) -> Self {
        self.rules
            .push((pattern.to_string(), CommandOutput::ok(stdout)));
        self
    }

    /// Fail commands containing `pattern` with `stderr`
    pub fn fail(mut self, pattern: &str, stderr: &str) -> Self {
        self.rules
            .push((pattern.to_string(), CommandOutput::failed(stderr)));
        self
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.files
            .borrow_mut()
            .insert(path.to_string(), content.to_string());
        self
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.dirs.borrow_mut().insert(path.to_string());
        self
    }

    pub fn unprivileged(mut self) -> Self {
        self.privileged = false;
        self
    }

    /// Every command run so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.log.borrow().iter().map(|(c, _)| c.clone()).collect()
    }

    /// Whether any command contained `pattern`
    pub fn ran(&self, pattern: &str) -> bool {
        self.log.borrow().iter().any(|(c, _)| c.contains(pattern))
    }

    /// Elevation requested by each command containing `pattern`
    pub fn elevation(&self, pattern: &str) -> Vec<bool> {
        self.log
            .borrow()
            .iter()
            .filter(|(c, _)| c.contains(pattern))
            .map(|(_, elevate)| *elevate)
            .collect()
    }

    /// Commands containing `pattern` ran, all of them elevated
    pub fn ran_elevated(&self, pattern: &str) -> bool {
        let elevation = self.elevation(pattern);
        !elevation.is_empty() && elevation.iter().all(|e| *e)
    }

    /// Commands containing `pattern` ran, none of them elevated
    pub fn ran_unelevated(&self, pattern: &str) -> bool {
        let elevation = self.elevation(pattern);
        !elevation.is_empty() && elevation.iter().all(|e| !*e)
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.files.borrow().get(path).cloned()
    }

    fn exists(&self, path: &str) -> bool {
        self.files.borrow().contains_key(path) || self.dirs.borrow().contains(path)
    }

    fn builtin(&self, command: &str, input: Option<&str>) -> CommandOutput {
        let status = |ok: bool| {
            if ok {
                CommandOutput::ok("")
            } else {
                CommandOutput::failed("")
            }
        };

        if let Some(path) = command.strip_prefix("test -e ") {
            return status(self.exists(path));
        }
        if let Some(path) = command.strip_prefix("test -f ") {
            return status(self.files.borrow().contains_key(path));
        }
        if let Some(path) = command.strip_prefix("cat ") {
            return match self.files.borrow().get(path) {
                Some(content) => CommandOutput::ok(content.clone()),
                None => CommandOutput::failed(format!("cat: {path}: No such file or directory")),
            };
        }
        if let Some(path) = command
            .strip_prefix("tee -a ")
            .and_then(|rest| rest.strip_suffix(" > /dev/null"))
        {
            let mut files = self.files.borrow_mut();
            files
                .entry(path.to_string())
                .or_default()
                .push_str(input.unwrap_or_default());
            return CommandOutput::ok("");
        }
        if let Some(path) = command
            .strip_prefix("tee ")
            .and_then(|rest| rest.strip_suffix(" > /dev/null"))
        {
            self.files
                .borrow_mut()
                .insert(path.to_string(), input.unwrap_or_default().to_string());
            return CommandOutput::ok("");
        }
        if let Some(args) = command.strip_prefix("cp ") {
            // sources that exist are copied into a `dir/` destination
            let args: Vec<&str> = args.split_whitespace().collect();
            if let Some((dest, sources)) = args.split_last() {
                let mut files = self.files.borrow_mut();
                for source in sources {
                    let Some(content) = files.get(*source).cloned() else {
                        continue;
                    };
                    let target = match dest.strip_suffix('/') {
                        Some(dir) => {
                            let name = source.rsplit('/').next().unwrap_or(source);
                            format!("{dir}/{name}")
                        }
                        None => (*dest).to_string(),
                    };
                    files.insert(target, content);
                }
            }
            return CommandOutput::ok("");
        }
        if let Some(paths) = command.strip_prefix("mkdir -p ") {
            let mut dirs = self.dirs.borrow_mut();
            for path in paths.split_whitespace() {
                dirs.insert(path.to_string());
            }
            return CommandOutput::ok("");
        }
        if let Some(path) = command.strip_prefix("rm -rf ") {
            self.dirs.borrow_mut().remove(path);
            self.files
                .borrow_mut()
                .retain(|file, _| !file.starts_with(&format!("{path}/")));
            return CommandOutput::ok("");
        }

        CommandOutput::ok("")
    }

    fn answer(&self, command: &str, input: Option<&str>, opts: RunOptions) -> CommandOutput {
        self.log
            .borrow_mut()
            .push((command.to_string(), opts.elevate));
        self.rules
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map_or_else(|| self.builtin(command, input), |(_, output)| output.clone())
    }
}

impl CommandRunner for FakeHost {
    fn run(&self, command: &str, opts: RunOptions) -> workflow::Result<CommandOutput> {
        Ok(self.answer(command, None, opts))
    }

    fn run_with_input(
        &self,
        command: &str,
        input: &str,
        opts: RunOptions,
    ) -> workflow::Result<CommandOutput> {
        Ok(self.answer(command, Some(input), opts))
    }

    fn is_privileged(&self) -> workflow::Result<bool> {
        Ok(self.privileged)
    }
}
