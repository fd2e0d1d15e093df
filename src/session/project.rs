//! The project collaborator: building the program and creating simulators for it.
use std::path::PathBuf;
use std::process::Command;

use crate::disasm::Disassembly;
use crate::err::DisasmErr;
use crate::sim::Simulator;

/// A project the user works on.
///
/// The project knows how to build its executable, how to disassemble it,
/// and which simulator runs it.
pub trait Project: Send {
    /// The name of the project.
    fn name(&self) -> &str;

    /// The path of the built executable.
    fn exec_path(&self) -> PathBuf;

    /// Creates a fresh simulator handle for this project.
    ///
    /// The handle does not have the executable loaded yet.
    fn new_sim(&self) -> Box<dyn Simulator>;

    /// Builds the executable.
    ///
    /// A failed build is reported through [`CompileOutput::success`].
    /// An error is only returned if the build could not be run at all.
    fn compile(&mut self) -> std::io::Result<CompileOutput>;

    /// Disassembles the built executable.
    fn disassembly(&mut self) -> Result<Disassembly, DisasmErr>;
}
impl dyn Project {} // assert Project is dyn safe

/// The result of a build.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompileOutput {
    /// Whether the build succeeded.
    pub success: bool,
    /// Standard output of the build.
    pub output: String,
    /// Standard error of the build.
    pub errors: String,
}
impl CompileOutput {
    /// Every line of the output and errors that points to a source location
    /// (`file.s:LINE: message`).
    ///
    /// ```
    /// use bass_debugger::session::CompileOutput;
    ///
    /// let out = CompileOutput {
    ///     success: false,
    ///     output: String::new(),
    ///     errors: "main.s: Assembler messages:\nmain.s:12: Error: bad instruction `mvo r0,#1'\n".to_string(),
    /// };
    /// let diags: Vec<_> = out.diagnostics().collect();
    /// assert_eq!(diags.len(), 1);
    /// assert_eq!((diags[0].file, diags[0].line), ("main.s", 12));
    /// assert_eq!(diags[0].message, "Error: bad instruction `mvo r0,#1'");
    /// ```
    pub fn diagnostics(&self) -> impl Iterator<Item=Diagnostic<'_>> {
        self.output.lines()
            .chain(self.errors.lines())
            .filter_map(Diagnostic::parse)
    }
}

/// A build message attached to a source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostic<'a> {
    /// The source file.
    pub file: &'a str,
    /// The line in the source file.
    pub line: u32,
    /// The message.
    pub message: &'a str,
}
impl<'a> Diagnostic<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        let (file, rest) = line.split_once(':')?;
        let (lineno, message) = rest.split_once(':')?;

        if !file.contains('.') || file.contains(char::is_whitespace) {
            return None;
        }
        Some(Self {
            file,
            line: lineno.parse().ok()?,
            message: message.trim()
        })
    }
}

/// A project in a directory, built with `make` and disassembled with `make disasm`.
pub struct MakeProject {
    name: String,
    dir: PathBuf,
    exec: String,
    factory: Box<dyn Fn() -> Box<dyn Simulator> + Send>
}
impl MakeProject {
    /// Creates a project in `dir` whose build produces the executable `exec`.
    ///
    /// The simulators of this project are created by `factory`.
    pub fn new(
        name: impl Into<String>,
        dir: impl Into<PathBuf>,
        exec: impl Into<String>,
        factory: impl Fn() -> Box<dyn Simulator> + Send + 'static
    ) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            exec: exec.into(),
            factory: Box::new(factory)
        }
    }

    /// The directory of the project.
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    fn make(&self, target: Option<&str>) -> std::io::Result<std::process::Output> {
        let mut cmd = Command::new("make");
        cmd.current_dir(&self.dir);
        if let Some(t) = target {
            cmd.arg(t);
        }
        log::debug!("running {cmd:?} in {}", self.dir.display());
        cmd.output()
    }
}
impl std::fmt::Debug for MakeProject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MakeProject")
            .field("name", &self.name)
            .field("dir", &self.dir)
            .field("exec", &self.exec)
            .finish_non_exhaustive()
    }
}
impl Project for MakeProject {
    fn name(&self) -> &str {
        &self.name
    }

    fn exec_path(&self) -> PathBuf {
        self.dir.join(&self.exec)
    }

    fn new_sim(&self) -> Box<dyn Simulator> {
        (self.factory)()
    }

    fn compile(&mut self) -> std::io::Result<CompileOutput> {
        let out = self.make(None)?;
        Ok(CompileOutput {
            success: out.status.success(),
            output: format!("make\n{}", String::from_utf8_lossy(&out.stdout)),
            errors: String::from_utf8_lossy(&out.stderr).into_owned()
        })
    }

    fn disassembly(&mut self) -> Result<Disassembly, DisasmErr> {
        let out = self.make(Some("disasm"))?;
        match out.status.success() {
            true  => Ok(Disassembly::parse(&String::from_utf8_lossy(&out.stdout))),
            false => Err(DisasmErr::Failed(String::from_utf8_lossy(&out.stderr).replace('\n', " "))),
        }
    }
}
