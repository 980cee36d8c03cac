// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

// Criterion benchmarks for the proof-state parser, tactic instrumentation
// and a full coordinator step

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use proofdriver::config::NamingConfig;
use proofdriver::error::SessionResult;
use proofdriver::parsers::parse_proof_state;
use proofdriver::session::protocol::{ProverMessage, Severity};
use proofdriver::session::{ProofChecker, SessionEvent};
use proofdriver::{
    Button, Coordinator, Course, DriverConfig, TacticCode, UserAction, VirtualFileAssembler,
};
use std::time::Duration;
use tokio::sync::broadcast;

const REAL: &str = "CONSTANT¿[name:ℝ¿]";

fn local(name: &str) -> String {
    format!("LOCAL_CONSTANT¿[name:{name}/identifier:0.{name}¿]")
}

/// Context of `n` reals and `n` inequalities between consecutive ones
fn dump(n: usize) -> (String, String) {
    let mut lines = Vec::new();
    for i in 0..n {
        lines.push(format!("OBJECT[{}] ¿= {REAL}", local(&format!("x{i}"))));
    }
    for i in 1..n {
        lines.push(format!(
            "PROPERTY[{}] ¿= PROP_<¿({}¿, {}¿)",
            local(&format!("h{i}")),
            local(&format!("x{}", i - 1)),
            local(&format!("x{i}"))
        ));
    }
    let x = "LOCAL_CONSTANT¿[name:y/identifier:_fresh.1¿]";
    let target = format!(
        "PROPERTY[METAVAR¿[name:_m0¿]] ¿= QUANT_∀¿({REAL}¿, {x}¿, PROP_EQUALS¿({x}¿, {x}¿)¿)"
    );
    (
        format!("context:\n{}", lines.join("\n")),
        format!("targets:\n{target}"),
    )
}

fn bench_parse_proof_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_proof_state");
    let naming = NamingConfig::default();

    for n in [1, 10, 50] {
        let (hypo, targets) = dump(n);
        group.bench_with_input(BenchmarkId::new("context_size", n), &n, |b, _| {
            b.iter(|| parse_proof_state(black_box(&hypo), black_box(&targets), &naming))
        });
    }

    group.finish();
}

fn rewrite_code() -> TacticCode {
    let rewrite = |arrow: &str| {
        TacticCode::and_then_all(vec![
            TacticCode::atomic("have k' := k"),
            TacticCode::atomic(format!("rw {arrow}h at k'")),
            TacticCode::atomic("clear k"),
        ])
    };
    TacticCode::or_else_all(
        rewrite(""),
        [
            rewrite("← "),
            TacticCode::atomic("assumption")
                .or_else(TacticCode::atomic("linarith"))
                .with_success("Target solved"),
        ],
    )
}

fn bench_tactic_code(c: &mut Criterion) {
    let mut group = c.benchmark_group("tactic_code");
    let code = rewrite_code();

    group.bench_function("instrument", |b| {
        b.iter(|| black_box(code.clone()).add_no_meta_vars().instrument())
    });

    let (numbered, instrumented) = code.add_no_meta_vars().instrument();
    group.bench_function("to_source", |b| {
        b.iter(|| black_box(&instrumented).to_source(false))
    });
    group.bench_function("resolve_effective", |b| {
        b.iter(|| {
            let effective = numbered.resolve_effective(black_box(&[(0, 1)]));
            numbered.success_message_for(&effective.to_source(true))
        })
    });

    group.finish();
}

/// Answers every live-step file with the same single-goal dump
struct FixedChecker {
    hypo: String,
    targets: String,
    events: broadcast::Sender<SessionEvent>,
}

#[async_trait]
impl ProofChecker for FixedChecker {
    async fn check(&mut self, content: &str, _timeout: Duration) -> SessionResult<Vec<ProverMessage>> {
        let hypo_line = content
            .lines()
            .position(|l| l.trim_start().starts_with("hypo_analysis"))
            .map_or(0, |i| i + 1);
        let message = |line: usize, text: &str| ProverMessage {
            file_name: "exercise.lean".into(),
            pos_line: line,
            pos_col: 2,
            severity: Severity::Information,
            caption: String::new(),
            text: text.into(),
        };
        Ok(vec![
            message(hypo_line, &self.hypo),
            message(hypo_line + 1, &self.targets),
        ])
    }

    async fn restart(&mut self) -> SessionResult<()> {
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(30)
    }
}

const COURSE: &str = "\
namespace bench

lemma refl_forall : ∀ y : ℝ, y = y :=
begin
  sorry
end

end bench
";

fn bench_coordinator_step(c: &mut Criterion) {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => panic!("cannot build a runtime: {e}"),
    };
    let course = Course::scan(COURSE);
    let mut group = c.benchmark_group("coordinator");

    for n in [1, 20] {
        let (hypo, targets) = dump(n);
        group.bench_with_input(BenchmarkId::new("intro_step", n), &n, |b, _| {
            b.to_async(&runtime).iter(|| async {
                let Some(exercise) = course.exercise("refl_forall") else {
                    return;
                };
                let Ok(assembler) = VirtualFileAssembler::new(&course, exercise) else {
                    return;
                };
                let checker = FixedChecker {
                    hypo: hypo.clone(),
                    targets: targets.clone(),
                    events: broadcast::channel(8).0,
                };
                if let Ok(mut coordinator) =
                    Coordinator::start(checker, assembler, &DriverConfig::default()).await
                {
                    black_box(coordinator.step(UserAction::button(Button::Forall)).await);
                }
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_parse_proof_state,
    bench_tactic_code,
    bench_coordinator_step
);
criterion_main!(benches);
