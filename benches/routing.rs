// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Benchmarks for the routing hot path.
//!
//! Run with: `cargo bench --bench routing`

use std::hint::black_box;
use std::sync::Arc;

use async_trait::async_trait;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use switchyard::agents::{parse_candidates, AgentRegistry, ChatAgent, SharedAgent};
use switchyard::chat::ChatRequest;
use switchyard::config::{merge_config, CliOptions, WorkspaceConfig};
use switchyard::error::DispatchError;
use switchyard::prompts::{
    format_chat_agents, ChatAgentsVariable, PromptService, ORCHESTRATOR_TEMPLATE_ID,
};

struct StubAgent {
    id: String,
}

#[async_trait]
impl ChatAgent for StubAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        "Answers questions about a particular corner of the codebase."
    }

    async fn invoke(&self, _request: &mut ChatRequest) -> Result<(), DispatchError> {
        Ok(())
    }
}

fn stub_agents(count: usize) -> Vec<SharedAgent> {
    (0..count)
        .map(|i| Arc::new(StubAgent { id: format!("Agent{}", i) }) as SharedAgent)
        .collect()
}

fn bench_parse_candidates(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_candidates");

    let inputs = [
        ("single", r#"["Coder"]"#.to_string()),
        ("fenced", "```json\n[\"Coder\", \"Architect\"]\n```".to_string()),
        ("invalid", "I think the Coder agent fits best.".to_string()),
        (
            "long",
            format!(
                "[{}]",
                (0..50).map(|i| format!("\"Agent{}\"", i)).collect::<Vec<_>>().join(",")
            ),
        ),
    ];

    for (name, input) in &inputs {
        group.bench_with_input(BenchmarkId::from_parameter(name), input, |b, input| {
            b.iter(|| parse_candidates(black_box(input)));
        });
    }

    group.finish();
}

fn bench_prompt_rendering(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("prompt_rendering");

    for count in [4, 32] {
        let agents = stub_agents(count);
        group.bench_with_input(BenchmarkId::new("format_chat_agents", count), &agents, |b, agents| {
            b.iter(|| format_chat_agents(black_box(agents)));
        });

        let (prompts, _registry) = rt.block_on(async {
            let registry = Arc::new(AgentRegistry::new());
            for agent in stub_agents(count) {
                registry.register(agent).await.unwrap();
            }
            let prompts = PromptService::with_builtins().await;
            prompts
                .register_variable(Arc::new(ChatAgentsVariable::new(Arc::downgrade(&registry))))
                .await;
            (prompts, registry)
        });

        group.bench_function(BenchmarkId::new("orchestrator_prompt", count), |b| {
            b.to_async(&rt)
                .iter(|| async { prompts.get_prompt(black_box(ORCHESTRATOR_TEMPLATE_ID)).await });
        });
    }

    group.finish();
}

fn bench_merge_config(c: &mut Criterion) {
    let global = WorkspaceConfig {
        provider: Some("ollama".to_string()),
        disabled_agents: Some(vec!["Architect".to_string()]),
        ..Default::default()
    };
    let workspace = WorkspaceConfig {
        model: Some("llama3.2".to_string()),
        fallback_agent: Some("Coder".to_string()),
        ..Default::default()
    };

    c.bench_function("merge_config", |b| {
        b.iter(|| {
            merge_config(
                black_box(Some(global.clone())),
                black_box(Some(workspace.clone())),
                None,
                CliOptions::default(),
            )
        });
    });
}

criterion_group!(
    benches,
    bench_parse_candidates,
    bench_prompt_rendering,
    bench_merge_config,
);
criterion_main!(benches);
