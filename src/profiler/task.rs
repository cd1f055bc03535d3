//! Task descriptors and per-cycle task generation.
//!
//! A worker asks its [`TaskGenerator`] for one [`Cycle`] per iteration. Most
//! modes produce a single descriptor. `addpkg+call` produces a composite
//! cycle whose two legs share one package name, so the package registered by
//! the first leg is the one called by the second.
//!
//! [`TaskKind`] has no composite variant. The composite mode only exists as
//! [`Cycle::Composite`], which keeps it away from single-command rendering.

use rand::RngExt;

use crate::profiler::config::{TargetConfig, TaskMode};

/// Length of generated package names.
pub const SUBJECT_NAME_LENGTH: usize = 20;

/// Alphabet generated package names are drawn from.
const SUBJECT_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Function called when none is configured.
pub const DEFAULT_OPERATION: &str = "Main";

/// Gas fee attached to every transaction, in ugnot.
pub const GAS_FEE: u64 = 10_000_000;

/// Gas limit attached to every transaction.
pub const GAS_WANTED: u64 = 800_000;

/// Account whose balance `balanceQuery` mode polls.
pub const BALANCE_ADDRESS: &str = "g1jg8mtutu9khhfwc4nxmuhcpftf0pajdhfvsqf5";

/// Draw a random package name of [`SUBJECT_NAME_LENGTH`] lowercase letters.
pub fn random_identifier() -> String {
    let mut rng = rand::rng();
    (0..SUBJECT_NAME_LENGTH)
        .map(|_| SUBJECT_ALPHABET[rng.random_range(0..SUBJECT_ALPHABET.len())] as char)
        .collect()
}

/// A single executable command kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Register,
    Invoke,
    BalanceQuery,
    RenderQuery,
}

/// One unit of work against the target endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub kind: TaskKind,
    pub subject_name: String,
    pub operation_name: String,
    pub client: String,
    pub endpoint: String,
    pub credential_holder: String,
    pub source_directory: String,
    pub network_id: String,
}

impl TaskDescriptor {
    /// Render the shell command line for this task.
    pub fn render_command(&self) -> String {
        match self.kind {
            TaskKind::Register => format!(
                "{} maketx addpkg --pkgpath 'gno.land/r/{}' --pkgdir {} {}",
                self.client,
                self.subject_name,
                self.source_directory,
                self.transaction_flags()
            ),
            TaskKind::Invoke => format!(
                "{} maketx call --pkgpath 'gno.land/r/{}' --func {} {}",
                self.client,
                self.subject_name,
                self.operation_name,
                self.transaction_flags()
            ),
            TaskKind::BalanceQuery => {
                format!("{} query bank/balances/{BALANCE_ADDRESS}", self.client)
            }
            TaskKind::RenderQuery => format!(
                "{} query vm/qrender --data '{}:' --remote {}",
                self.client, self.subject_name, self.endpoint
            ),
        }
    }

    fn transaction_flags(&self) -> String {
        format!(
            "--gas-fee {GAS_FEE}ugnot --gas-wanted {GAS_WANTED} --broadcast \
             --chainid {} --remote {} --insecure-password-stdin=true {}",
            self.network_id, self.endpoint, self.credential_holder
        )
    }
}

/// The task descriptors for one worker iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cycle {
    /// A single command.
    Single(TaskDescriptor),
    /// Register then invoke, sharing `subject_name`.
    Composite {
        register: TaskDescriptor,
        invoke: TaskDescriptor,
    },
}

impl Cycle {
    /// Descriptors in execution order.
    pub fn tasks(&self) -> Vec<&TaskDescriptor> {
        match self {
            Self::Single(task) => vec![task],
            Self::Composite { register, invoke } => vec![register, invoke],
        }
    }
}

/// Produces the [`Cycle`] for each iteration from static target config.
///
/// Each worker owns its own generator, so no state is shared between workers.
#[derive(Debug, Clone)]
pub struct TaskGenerator {
    target: TargetConfig,
    cycles: u64,
}

impl TaskGenerator {
    pub fn new(target: TargetConfig) -> Self {
        Self { target, cycles: 0 }
    }

    /// Number of cycles generated so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Build the next cycle.
    ///
    /// Unpinned package names are drawn fresh for every cycle. Within a
    /// composite cycle both legs get the same name.
    pub fn next_cycle(&mut self) -> Cycle {
        self.cycles += 1;
        let subject = self.subject_name();
        match self.target.mode {
            TaskMode::Register => Cycle::Single(self.descriptor(TaskKind::Register, subject)),
            TaskMode::Invoke => Cycle::Single(self.descriptor(TaskKind::Invoke, subject)),
            TaskMode::BalanceQuery => {
                Cycle::Single(self.descriptor(TaskKind::BalanceQuery, subject))
            }
            TaskMode::RenderQuery => Cycle::Single(self.descriptor(TaskKind::RenderQuery, subject)),
            TaskMode::RegisterAndInvoke => Cycle::Composite {
                register: self.descriptor(TaskKind::Register, subject.clone()),
                invoke: self.descriptor(TaskKind::Invoke, subject),
            },
        }
    }

    fn subject_name(&self) -> String {
        self.target
            .subject_name
            .clone()
            .unwrap_or_else(random_identifier)
    }

    fn descriptor(&self, kind: TaskKind, subject_name: String) -> TaskDescriptor {
        TaskDescriptor {
            kind,
            subject_name,
            operation_name: self
                .target
                .operation_name
                .clone()
                .unwrap_or_else(|| DEFAULT_OPERATION.to_string()),
            client: self.target.client.clone(),
            endpoint: self.target.endpoint.clone(),
            credential_holder: self.target.credential_holder.clone(),
            source_directory: self.target.source_directory.clone(),
            network_id: self.target.network_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(mode: TaskMode) -> TargetConfig {
        TargetConfig {
            mode,
            ..TargetConfig::default()
        }
    }

    #[test]
    fn test_random_identifier_shape() {
        let id = random_identifier();
        assert_eq!(id.len(), SUBJECT_NAME_LENGTH);
        assert!(id.bytes().all(|b| b.is_ascii_lowercase()));
    }

    #[test]
    fn test_random_identifier_unique() {
        let first = random_identifier();
        let second = random_identifier();
        assert_ne!(first, second, "Random calls not unique");
    }

    #[test]
    fn test_composite_cycle_shares_subject() {
        let mut generator = TaskGenerator::new(target(TaskMode::RegisterAndInvoke));
        match generator.next_cycle() {
            Cycle::Composite { register, invoke } => {
                assert_eq!(register.kind, TaskKind::Register);
                assert_eq!(invoke.kind, TaskKind::Invoke);
                assert_eq!(register.subject_name, invoke.subject_name);
                assert_eq!(register.subject_name.len(), SUBJECT_NAME_LENGTH);
            }
            other => panic!("Expected composite cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_composite_next_cycle_gets_fresh_subject() {
        let mut generator = TaskGenerator::new(target(TaskMode::RegisterAndInvoke));
        let first = generator.next_cycle();
        let second = generator.next_cycle();
        let subject = |cycle: &Cycle| cycle.tasks()[0].subject_name.clone();
        assert!(!subject(&second).is_empty());
        assert_ne!(subject(&first), subject(&second));
        assert_eq!(generator.cycles(), 2);
    }

    #[test]
    fn test_composite_pinned_subject_is_reused() {
        let mut config = target(TaskMode::RegisterAndInvoke);
        config.subject_name = Some("counter".to_string());
        let mut generator = TaskGenerator::new(config);
        for _ in 0..3 {
            for task in generator.next_cycle().tasks() {
                assert_eq!(task.subject_name, "counter");
            }
        }
    }

    #[test]
    fn test_single_mode_randomizes_subject_each_call() {
        let mut generator = TaskGenerator::new(target(TaskMode::Register));
        let a = generator.next_cycle();
        let b = generator.next_cycle();
        assert_eq!(a.tasks().len(), 1);
        assert_ne!(a.tasks()[0].subject_name, b.tasks()[0].subject_name);
    }

    #[test]
    fn test_default_operation_is_main() {
        let mut config = target(TaskMode::Invoke);
        config.subject_name = Some("testABC".to_string());
        let mut generator = TaskGenerator::new(config);
        let cycle = generator.next_cycle();
        assert_eq!(cycle.tasks()[0].operation_name, "Main");
    }

    #[test]
    fn test_render_register_command() {
        let mut config = target(TaskMode::Register);
        config.subject_name = Some("counter".to_string());
        let mut generator = TaskGenerator::new(config);
        let cycle = generator.next_cycle();
        assert_eq!(
            cycle.tasks()[0].render_command(),
            "gnokey maketx addpkg --pkgpath 'gno.land/r/counter' --pkgdir . \
             --gas-fee 10000000ugnot --gas-wanted 800000 --broadcast \
             --chainid dev --remote localhost:26657 --insecure-password-stdin=true Dev"
        );
    }

    #[test]
    fn test_render_invoke_command() {
        let mut config = target(TaskMode::Invoke);
        config.subject_name = Some("testABC".to_string());
        config.operation_name = Some("Render".to_string());
        let mut generator = TaskGenerator::new(config);
        let command = generator.next_cycle().tasks()[0].render_command();
        assert!(command.starts_with("gnokey maketx call --pkgpath 'gno.land/r/testABC' --func Render "));
        assert!(command.ends_with("--insecure-password-stdin=true Dev"));
    }

    #[test]
    fn test_render_balance_query_command() {
        let mut generator = TaskGenerator::new(target(TaskMode::BalanceQuery));
        let command = generator.next_cycle().tasks()[0].render_command();
        assert_eq!(
            command,
            "gnokey query bank/balances/g1jg8mtutu9khhfwc4nxmuhcpftf0pajdhfvsqf5"
        );
    }

    #[test]
    fn test_render_render_query_command() {
        let mut config = target(TaskMode::RenderQuery);
        config.subject_name = Some("blog".to_string());
        config.endpoint = "rpc.example:26657".to_string();
        let mut generator = TaskGenerator::new(config);
        let command = generator.next_cycle().tasks()[0].render_command();
        assert_eq!(
            command,
            "gnokey query vm/qrender --data 'blog:' --remote rpc.example:26657"
        );
    }

    #[test]
    fn test_custom_client_binary() {
        let mut config = target(TaskMode::BalanceQuery);
        config.client = "/opt/gno/bin/gnokey".to_string();
        let mut generator = TaskGenerator::new(config);
        let command = generator.next_cycle().tasks()[0].render_command();
        assert!(command.starts_with("/opt/gno/bin/gnokey query"));
    }
}
