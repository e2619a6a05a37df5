use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use examdesk_core::model::{AnswerMap, OptionKey, Question, QuestionId, QuestionSet};
use examdesk_core::scoring::{review, score, MarkingScheme};

fn build_set(n: usize) -> QuestionSet {
    let questions = (1..=n)
        .map(|i| {
            let options: BTreeMap<OptionKey, String> = ["a", "b", "c", "d"]
                .into_iter()
                .map(|k| (OptionKey::from(k), format!("option {k}")))
                .collect();
            Question {
                id: QuestionId::from(i as u64),
                prompt: format!("Question {i}"),
                options,
                correct_option: OptionKey::from(["a", "b", "c", "d"][i % 4]),
            }
        })
        .collect();
    QuestionSet::new(questions).expect("generated ids are unique")
}

// Answers two thirds of the questions, always with option "b".
fn build_answers(set: &QuestionSet) -> AnswerMap {
    set.iter()
        .enumerate()
        .filter(|(i, _)| i % 3 != 0)
        .map(|(_, q)| (q.id.clone(), OptionKey::from("b")))
        .collect()
}

fn bench_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("score");
    let scheme = MarkingScheme::default();

    for n in [10, 80, 1000] {
        let set = build_set(n);
        let answers = build_answers(&set);
        group.bench_function(format!("{n}_questions"), |b| {
            b.iter(|| score(black_box(&set), black_box(&answers), &scheme))
        });
    }

    group.finish();
}

fn bench_review(c: &mut Criterion) {
    let set = build_set(80);
    let answers = build_answers(&set);
    c.bench_function("review_80", |b| {
        b.iter(|| review(black_box(&set), black_box(&answers)))
    });
}

criterion_group!(benches, bench_score, bench_review);
criterion_main!(benches);
