use castcue::attribution::{find_matches, index_quotes};
use castcue::{Engine, ManualClock, PatternCompiler, Profile, RecordingSink, TurnKey};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

const CAST: &[&str] = &["Kotori", "Umi", "Honoka", "Hanayo", "Rin", "Maki", "Nozomi", "Eli", "Nico"];

const SCENE: &str = "Kotori: Good morning, everyone!\n\
\"You're late again,\" Umi sighed, folding her arms. Honoka grinned and waved.\n\
She pulled a bag of bread from her coat. \"Breakfast, Umi!\"\n\
Maki's eyes narrowed. \"Honestly,\" Maki muttered. Nozomi laughed softly.\n\
Eli stepped forward. \"Let's just start practice.\" Nico shrugged.\n";

fn profile(names: usize) -> Profile {
    Profile {
        patterns: CAST.iter().take(names).map(|n| n.to_string()).collect(),
        global_cooldown_ms: 0,
        per_trigger_cooldown_ms: 0,
        ..Default::default()
    }
}

/// Pattern compilation cost as the cast grows
fn bench_profile_compilation(c: &mut Criterion) {
    let mut group = c.benchmark_group("profile_compilation");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(50);

    for names in [1, 3, 9].iter() {
        let profile = profile(*names);
        group.bench_with_input(BenchmarkId::new("compile", names), &profile, |b, profile| {
            b.iter(|| {
                let set = PatternCompiler::default()
                    .compile(&profile.name_patterns(), &profile.verb_lists(), &profile.veto_patterns)
                    .unwrap();
                black_box(set);
            })
        });
    }

    group.finish();
}

/// One full heuristic pass over a finished scene
fn bench_find_matches(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_matches");
    let profile = profile(CAST.len());
    let set = PatternCompiler::default()
        .compile(&profile.name_patterns(), &profile.verb_lists(), &profile.veto_patterns)
        .unwrap();
    let enabled = profile.enabled_heuristics();

    for repeats in [1, 4, 16].iter() {
        let text = SCENE.repeat(*repeats);
        group.bench_with_input(BenchmarkId::new("scene", repeats), &text, |b, text| {
            b.iter(|| {
                let quotes = index_quotes(text);
                let matches = find_matches(black_box(text), &set, &quotes, &enabled, Some("Honoka"));
                black_box(matches);
            })
        });
    }

    group.finish();
}

/// Streaming a scene through the engine in fixed-size tokens
fn bench_streaming_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("streaming_engine");
    let text = SCENE.repeat(8);
    let chars: Vec<char> = text.chars().collect();

    for chunk in [4, 16, 64].iter() {
        let tokens: Vec<String> = chars.chunks(*chunk).map(|c| c.iter().collect()).collect();
        group.bench_with_input(BenchmarkId::new("token_chars", chunk), &tokens, |b, tokens| {
            b.iter(|| {
                let mut engine = Engine::with_clock(profile(CAST.len()), ManualClock::new(0)).unwrap();
                let mut sink = RecordingSink::new();
                engine.on_turn_start(TurnKey::Live);
                for token in tokens {
                    engine.clock().advance(50);
                    engine.on_token(&TurnKey::Live, black_box(token), &mut sink);
                }
                black_box(sink.decisions.len());
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_profile_compilation,
    bench_find_matches,
    bench_streaming_engine
);
criterion_main!(benches);
