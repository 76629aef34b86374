use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use cs_core::pattern::CompiledRules;
use cs_core::rules::RuleSetKind;
use cs_core::{BlockIndex, PublisherRecord, TreeFilter};
use serde_json::{json, Value};

fn rules(count: usize) -> CompiledRules {
    let records = (0..count).map(|i| PublisherRecord::new(&format!("UC{i:022}"), &format!("Channel {i}"), ""));
    CompiledRules::compile(&BlockIndex::new(records).to_feed("Blocked"))
}

fn browse_response(items: usize) -> Value {
    let contents: Vec<Value> = (0..items)
        .map(|i| {
            json!({
                "richItemRenderer": {
                    "content": {
                        "videoRenderer": {
                            "videoId": format!("v{i}"),
                            "shortBylineText": {
                                "runs": [{
                                    "text": format!("Channel {}", i * 7),
                                    "navigationEndpoint": {"browseEndpoint": {"browseId": format!("UC{:022}", i * 7)}}
                                }]
                            }
                        }
                    }
                }
            })
        })
        .collect();
    json!({"contents": {"twoColumnBrowseResultsRenderer": {"tabs": [{"tabRenderer": {"content": {"richGridRenderer": {"contents": contents}}}}]}}})
}

fn filter_benchmark(c: &mut Criterion) {
    let rules = rules(500);
    let document = browse_response(200);
    let rule_set = RuleSetKind::Main.rule_set();

    c.bench_function("Filter browse response", |b| {
        b.iter_batched(
            || document.clone(),
            |mut doc| TreeFilter::new(&rules, rule_set).filter(black_box(&mut doc)),
            BatchSize::SmallInput,
        )
    });

    let empty = CompiledRules::default();
    c.bench_function("Filter with empty rules", |b| {
        b.iter_batched(
            || document.clone(),
            |mut doc| TreeFilter::new(&empty, rule_set).filter(black_box(&mut doc)),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, filter_benchmark);
criterion_main!(benches);
