#[macro_use]
extern crate criterion;

use criterion::{black_box, Criterion};
use rust_squad::squad::{
    decode_spans, AttentionVariant, OutputVariant, SquadConfig, SquadInput, SquadModel,
};
use std::time::{Duration, Instant};
use tch::{nn, no_grad, Device, Kind, Tensor};

static BATCH_SIZE: i64 = 32;
static CONTEXT_LENGTH: i64 = 300;
static QUESTION_LENGTH: i64 = 30;

fn create_squad_model(vs: &nn::VarStore, config: &SquadConfig) -> SquadModel {
    SquadModel::new(&vs.root() / "squad", config).unwrap()
}

fn create_input(config: &SquadConfig, device: Device) -> SquadInput {
    let char_ids = |length: i64| {
        if config.char_embed {
            Some(Tensor::randint(
                config.char_vocab_size,
                &[BATCH_SIZE, length, 16],
                (Kind::Int64, device),
            ))
        } else {
            None
        }
    };
    SquadInput {
        context_ids: Tensor::randint(
            config.vocab_size,
            &[BATCH_SIZE, CONTEXT_LENGTH],
            (Kind::Int64, device),
        ),
        context_mask: Tensor::ones(&[BATCH_SIZE, CONTEXT_LENGTH], (Kind::Int64, device)),
        context_char_ids: char_ids(CONTEXT_LENGTH),
        question_ids: Tensor::randint(
            config.vocab_size,
            &[BATCH_SIZE, QUESTION_LENGTH],
            (Kind::Int64, device),
        ),
        question_mask: Tensor::ones(&[BATCH_SIZE, QUESTION_LENGTH], (Kind::Int64, device)),
        question_char_ids: char_ids(QUESTION_LENGTH),
    }
}

fn squad_forward_pass(iters: u64, model: &SquadModel, input: &SquadInput) -> Duration {
    let mut duration = Duration::new(0, 0);
    for _i in 0..iters {
        let start = Instant::now();
        let output = no_grad(|| model.forward_t(input, false)).unwrap();
        let _ = decode_spans(
            &output.start_probabilities,
            &output.end_probabilities,
            model.max_answer_length(),
        )
        .unwrap();
        duration = duration.checked_add(start.elapsed()).unwrap();
    }
    duration
}

fn bench_squad(c: &mut Criterion) {
    //    Set-up QA models
    unsafe {
        torch_sys::dummy_cuda_dependency();
    }
    let device = Device::cuda_if_available();
    for (attention, output) in &[
        (AttentionVariant::Bidaf, OutputVariant::BidafOut),
        (AttentionVariant::Basic, OutputVariant::AnsPtr),
        (AttentionVariant::Aoa, OutputVariant::Softmax),
    ] {
        let config = SquadConfig {
            attention: *attention,
            output: *output,
            vocab_size: 20_000,
            ..Default::default()
        };
        let vs = nn::VarStore::new(device);
        let model = create_squad_model(&vs, &config);
        let input = create_input(&config, device);

        c.bench_function(&format!("SQuAD forward pass ({}, {})", attention, output), |b| {
            b.iter_custom(|iters| black_box(squad_forward_pass(iters, &model, &input)))
        });
    }
}

criterion_group! {
name = benches;
config = Criterion::default().sample_size(10);
targets = bench_squad
}

criterion_main!(benches);
