use rust_squad::squad::{
    decode_spans, AttentionVariant, OutputVariant, SquadConfig, SquadInput, SquadModel,
    SquadOutput,
};
use rust_squad::{Config, RustSquadError};
use std::io::Write;
use tch::{nn, no_grad, Device, Kind, Tensor};

fn mask_from_lengths(lengths: &[i64], max_length: i64) -> Tensor {
    let values: Vec<i64> = lengths
        .iter()
        .flat_map(|&length| (0..max_length).map(move |position| (position < length) as i64))
        .collect();
    Tensor::of_slice(&values).view((lengths.len() as i64, max_length))
}

fn small_config(attention: AttentionVariant, output: OutputVariant) -> SquadConfig {
    SquadConfig {
        hidden_size: 6,
        keep_prob: 0.8,
        attention,
        output,
        vocab_size: 50,
        embedding_size: 8,
        char_vocab_size: 20,
        char_embedding_size: 4,
        char_filters: 5,
        ..Default::default()
    }
}

fn dummy_input(config: &SquadConfig, with_chars: bool) -> SquadInput {
    let options = (Kind::Int64, Device::Cpu);
    let char_ids = |length: i64| {
        if with_chars {
            Some(Tensor::randint(config.char_vocab_size, &[2, length, 4], options))
        } else {
            None
        }
    };
    SquadInput {
        context_ids: Tensor::randint(config.vocab_size, &[2, 9], options),
        context_mask: mask_from_lengths(&[9, 4], 9),
        context_char_ids: char_ids(9),
        question_ids: Tensor::randint(config.vocab_size, &[2, 5], options),
        question_mask: mask_from_lengths(&[3, 5], 5),
        question_char_ids: char_ids(5),
    }
}

fn check_output(output: &SquadOutput, mask: &Tensor) {
    let padding = mask.eq(0);
    for (logits, probabilities) in &[
        (&output.start_logits, &output.start_probabilities),
        (&output.end_logits, &output.end_probabilities),
    ] {
        assert_eq!(logits.size(), vec![2, 9]);
        assert_eq!(probabilities.size(), vec![2, 9]);
        let sums = probabilities.sum_dim_intlist(&[1], false, Kind::Float);
        assert!((sums - 1.0).abs().max().double_value(&[]) < 1e-5);
        let padded_probabilities = probabilities.masked_select(&padding);
        assert_eq!(padded_probabilities.abs().max().double_value(&[]), 0.0);
        let padded_logits = logits.masked_select(&padding);
        assert!(padded_logits.max().double_value(&[]) < -1e29);
    }
}

#[test]
fn squad_model_all_variants() -> anyhow::Result<()> {
    tch::manual_seed(0);
    for attention in &[
        AttentionVariant::Basic,
        AttentionVariant::Bidaf,
        AttentionVariant::Aoa,
    ] {
        for output in &[
            OutputVariant::Softmax,
            OutputVariant::AnsPtr,
            OutputVariant::BidafOut,
        ] {
            //    Set-up model
            let vs = nn::VarStore::new(Device::Cpu);
            let config = small_config(*attention, *output);
            let model = SquadModel::new(&vs.root() / "squad", &config)?;
            let input = dummy_input(&config, false);

            //    Forward pass
            let model_output = no_grad(|| model.forward_t(&input, false))?;

            check_output(&model_output, &input.context_mask);
        }
    }
    Ok(())
}

#[test]
fn squad_model_builds_only_selected_stages() -> anyhow::Result<()> {
    for char_embed in &[false, true] {
        for output in &[
            OutputVariant::Softmax,
            OutputVariant::AnsPtr,
            OutputVariant::BidafOut,
        ] {
            let vs = nn::VarStore::new(Device::Cpu);
            let config = SquadConfig {
                char_embed: *char_embed,
                ..small_config(AttentionVariant::Bidaf, *output)
            };
            let _model = SquadModel::new(&vs.root(), &config)?;
            let names: Vec<String> = vs.variables().keys().cloned().collect();
            let count = |prefix: &str| names.iter().filter(|name| name.starts_with(prefix)).count();

            //    Character stage only exists with character features
            assert_eq!(count("char_encoder.") > 0, *char_embed);
            //    The third encoder pass only exists for the BiDAF output head
            assert_eq!(count("end_encoder.") > 0, *output == OutputVariant::BidafOut);
            //    A single set of forward and backward cells shared by context and question
            assert_eq!(count("context_encoder.fw."), 4);
            assert_eq!(count("context_encoder.bw."), 4);
            assert_eq!(count("context_encoder."), 8);
            assert_eq!(count("question_encoder."), 0);
            assert_eq!(count("modeling_encoder."), 8);
        }
    }
    Ok(())
}

#[test]
fn squad_model_character_features_and_self_attention() -> anyhow::Result<()> {
    tch::manual_seed(1);
    let vs = nn::VarStore::new(Device::Cpu);
    let config = SquadConfig {
        char_embed: true,
        self_attention: true,
        ..small_config(AttentionVariant::Bidaf, OutputVariant::BidafOut)
    };
    let model = SquadModel::new(&vs.root(), &config)?;
    let input = dummy_input(&config, true);

    let model_output = no_grad(|| model.forward_t(&input, false))?;

    check_output(&model_output, &input.context_mask);
    Ok(())
}

#[test]
fn squad_model_training_forward_pass() -> anyhow::Result<()> {
    //    Dropout is active and gradients flow to the trainable weights only
    tch::manual_seed(2);
    let vs = nn::VarStore::new(Device::Cpu);
    let config = small_config(AttentionVariant::Basic, OutputVariant::Softmax);
    let model = SquadModel::new(&vs.root(), &config)?;
    let input = dummy_input(&config, false);

    let model_output = model.forward_t(&input, true)?;
    let loss = -(model_output.start_probabilities.select(1, 0).log().mean(Kind::Float));
    loss.backward();

    check_output(&model_output, &input.context_mask);
    assert!(vs.trainable_variables().len() < vs.variables().len());
    Ok(())
}

#[test]
fn squad_model_requires_character_ids() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let config = SquadConfig {
        char_embed: true,
        ..small_config(AttentionVariant::Basic, OutputVariant::Softmax)
    };
    let model = SquadModel::new(&vs.root(), &config)?;
    let input = dummy_input(&config, false);

    match no_grad(|| model.forward_t(&input, false)) {
        Err(RustSquadError::InvalidInput(_)) => {}
        _ => panic!("expected an invalid input error"),
    }
    Ok(())
}

#[test]
fn squad_model_rejects_invalid_configuration() {
    let vs = nn::VarStore::new(Device::Cpu);
    let config = SquadConfig {
        keep_prob: 0.0,
        ..small_config(AttentionVariant::Basic, OutputVariant::Softmax)
    };

    match SquadModel::new(&vs.root(), &config) {
        Err(RustSquadError::InvalidConfigurationError(_)) => {}
        _ => panic!("expected an invalid configuration error"),
    }
}

#[test]
fn squad_model_pretrained_embeddings() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let config = small_config(AttentionVariant::Aoa, OutputVariant::Softmax);
    let mut model = SquadModel::new(&vs.root(), &config)?;

    let embeddings = Tensor::randn(
        &[config.vocab_size, config.embedding_size],
        (Kind::Float, Device::Cpu),
    );
    model.set_word_embeddings(&embeddings)?;

    let wrong_embeddings = Tensor::randn(&[config.vocab_size, 3], (Kind::Float, Device::Cpu));
    match model.set_word_embeddings(&wrong_embeddings) {
        Err(RustSquadError::ShapeMismatch(_)) => {}
        _ => panic!("expected a shape mismatch error"),
    }
    Ok(())
}

#[test]
fn squad_config_from_file() -> anyhow::Result<()> {
    let mut config_file = tempfile::NamedTempFile::new()?;
    write!(
        config_file,
        r#"{{
            "hidden_size": 100,
            "keep_prob": 0.9,
            "attn": "aoa",
            "output": "ans_ptr",
            "char_embed": false,
            "vocab_size": 1000,
            "embedding_size": 50
        }}"#
    )?;

    let config = SquadConfig::from_file(config_file.path())?;

    assert_eq!(config.hidden_size, 100);
    assert_eq!(config.attention, AttentionVariant::Aoa);
    assert_eq!(config.output, OutputVariant::AnsPtr);
    assert!(!config.self_attention);
    assert_eq!(config.char_filters, 32);
    assert_eq!(config.char_kernel_size, 5);
    assert_eq!(config.max_answer_length, 15);
    Ok(())
}

#[test]
fn squad_config_rejects_unknown_variant() {
    let json = r#"{
        "hidden_size": 100,
        "keep_prob": 0.9,
        "attention": "luong",
        "output": "softmax",
        "char_embed": false,
        "vocab_size": 1000,
        "embedding_size": 50
    }"#;

    match SquadConfig::from_json_str(json) {
        Err(RustSquadError::ParseError(_)) => {}
        _ => panic!("expected a parse error"),
    }
}

#[test]
fn decode_spans_respects_length_limit() -> anyhow::Result<()> {
    let start_probabilities = Tensor::of_slice(&[0.9f32, 0.1, 0.0, 0.0]).unsqueeze(0);
    let end_probabilities = Tensor::of_slice(&[0.0f32, 0.2, 0.0, 0.8]).unsqueeze(0);

    let spans = decode_spans(&start_probabilities, &end_probabilities, 2)?;
    assert_eq!(spans.len(), 1);
    assert_eq!((spans[0].start, spans[0].end), (0, 1));
    assert!((spans[0].score - 0.18).abs() < 1e-6);

    let spans = decode_spans(&start_probabilities, &end_probabilities, 4)?;
    assert_eq!((spans[0].start, spans[0].end), (0, 3));
    Ok(())
}

#[test]
fn decode_spans_end_not_before_start() -> anyhow::Result<()> {
    let start_probabilities = Tensor::of_slice(&[0.1f32, 0.6, 0.3, 0.0, 0.0, 1.0]).view((2, 3));
    let end_probabilities = Tensor::of_slice(&[0.5f32, 0.2, 0.3, 0.7, 0.2, 0.1]).view((2, 3));

    let spans = decode_spans(&start_probabilities, &end_probabilities, 15)?;

    assert_eq!((spans[0].start, spans[0].end), (1, 2));
    assert!((spans[0].score - 0.18).abs() < 1e-6);
    assert_eq!((spans[1].start, spans[1].end), (2, 2));
    assert!(decode_spans(&start_probabilities, &end_probabilities, 0).is_err());
    Ok(())
}
