use rust_squad::encoder::{CharacterEncoder, SequenceEncoder};
use rust_squad::squad::SquadConfig;
use rust_squad::RustSquadError;
use tch::{nn, no_grad, Device, Kind, Tensor};

fn mask_from_lengths(lengths: &[i64], max_length: i64) -> Tensor {
    let values: Vec<i64> = lengths
        .iter()
        .flat_map(|&length| (0..max_length).map(move |position| (position < length) as i64))
        .collect();
    Tensor::of_slice(&values).view((lengths.len() as i64, max_length))
}

#[test]
fn sequence_encoder_output_width() -> anyhow::Result<()> {
    //    Set-up encoders
    let vs = nn::VarStore::new(Device::Cpu);
    let narrow_encoder = SequenceEncoder::new(&vs.root() / "narrow", 3, 7, 1.0);
    let wide_encoder = SequenceEncoder::new(&vs.root() / "wide", 17, 7, 1.0);
    let mask = mask_from_lengths(&[5, 2], 5);

    //    Forward pass
    let narrow_inputs = Tensor::randn(&[2, 5, 3], (Kind::Float, Device::Cpu));
    let wide_inputs = Tensor::randn(&[2, 5, 17], (Kind::Float, Device::Cpu));
    let narrow_output = no_grad(|| narrow_encoder.forward_t(&narrow_inputs, &mask, false))?;
    let wide_output = no_grad(|| wide_encoder.forward_t(&wide_inputs, &mask, false))?;

    assert_eq!(narrow_output.size(), vec![2, 5, 14]);
    assert_eq!(wide_output.size(), vec![2, 5, 14]);
    assert_eq!(narrow_encoder.output_size(), 14);
    Ok(())
}

#[test]
fn sequence_encoder_skips_padding() -> anyhow::Result<()> {
    tch::manual_seed(0);
    let vs = nn::VarStore::new(Device::Cpu);
    let encoder = SequenceEncoder::new(&vs.root() / "encoder", 4, 6, 0.5);
    let mask = mask_from_lengths(&[3, 5], 5);
    let inputs = Tensor::randn(&[2, 5, 4], (Kind::Float, Device::Cpu));
    let other_padding = inputs.copy();
    let _ = other_padding
        .narrow(1, 3, 2)
        .select(0, 0)
        .copy_(&Tensor::randn(&[2, 4], (Kind::Float, Device::Cpu)));

    let output = no_grad(|| encoder.forward_t(&inputs, &mask, false))?;
    let output_other_padding = no_grad(|| encoder.forward_t(&other_padding, &mask, false))?;

    //    Padded positions produce zero states
    let padded = output.select(0, 0).narrow(0, 3, 2);
    assert_eq!(padded.abs().max().double_value(&[]), 0.0);
    //    Real positions (both directions) do not see the padding
    let difference = (output - output_other_padding).abs().max().double_value(&[]);
    assert!(difference < 1e-6);
    Ok(())
}

#[test]
fn sequence_encoder_ties_weights_per_instance() -> anyhow::Result<()> {
    tch::manual_seed(1);
    let vs = nn::VarStore::new(Device::Cpu);
    let encoder = SequenceEncoder::new(&vs.root() / "context_encoder", 4, 5, 0.8);
    let other_encoder = SequenceEncoder::new(&vs.root() / "modeling_encoder", 4, 5, 0.8);
    let mask = mask_from_lengths(&[4], 4);
    let inputs = Tensor::randn(&[1, 4, 4], (Kind::Float, Device::Cpu));

    let first = no_grad(|| encoder.forward_t(&inputs, &mask, false))?;
    let second = no_grad(|| encoder.forward_t(&inputs, &mask, false))?;
    let other = no_grad(|| other_encoder.forward_t(&inputs, &mask, false))?;

    assert_eq!((&first - &second).abs().max().double_value(&[]), 0.0);
    assert!((&first - &other).abs().max().double_value(&[]) > 1e-6);
    assert_eq!(vs.variables().len(), 16);
    Ok(())
}

#[test]
fn sequence_encoder_rejects_invalid_inputs() {
    let vs = nn::VarStore::new(Device::Cpu);
    let encoder = SequenceEncoder::new(&vs.root() / "encoder", 4, 5, 1.0);
    let inputs = Tensor::randn(&[2, 3, 4], (Kind::Float, Device::Cpu));

    match encoder.forward_t(&inputs, &mask_from_lengths(&[3, 3, 3], 3), false) {
        Err(RustSquadError::ShapeMismatch(_)) => {}
        _ => panic!("expected a shape mismatch error"),
    }
    match encoder.forward_t(
        &Tensor::randn(&[2, 3, 6], (Kind::Float, Device::Cpu)),
        &mask_from_lengths(&[3, 3], 3),
        false,
    ) {
        Err(RustSquadError::ShapeMismatch(_)) => {}
        _ => panic!("expected a shape mismatch error"),
    }
}

#[test]
fn character_encoder_short_words() -> anyhow::Result<()> {
    //    Set-up character encoder with a kernel wider than the words
    let vs = nn::VarStore::new(Device::Cpu);
    let config = SquadConfig {
        char_embed: true,
        char_kernel_size: 5,
        char_filters: 32,
        ..Default::default()
    };
    let char_encoder = CharacterEncoder::new(&vs.root() / "char_encoder", &config);
    let char_ids = Tensor::randint(config.char_vocab_size, &[2, 4, 3], (Kind::Int64, Device::Cpu));
    let mask = mask_from_lengths(&[4, 2], 4);

    let output = no_grad(|| char_encoder.forward_t(&char_ids, &mask, false))?;

    assert_eq!(output.size(), vec![2, 4, 32]);
    assert_eq!(char_encoder.output_size(), 32);
    let padded = output.select(0, 1).narrow(0, 2, 2);
    assert_eq!(padded.abs().max().double_value(&[]), 0.0);
    Ok(())
}

#[test]
fn character_encoder_rejects_empty_sequences() {
    let vs = nn::VarStore::new(Device::Cpu);
    let config = SquadConfig::default();
    let char_encoder = CharacterEncoder::new(&vs.root() / "char_encoder", &config);
    let char_ids = Tensor::zeros(&[1, 0, 4], (Kind::Int64, Device::Cpu));
    let mask = Tensor::zeros(&[1, 0], (Kind::Int64, Device::Cpu));

    match char_encoder.forward_t(&char_ids, &mask, false) {
        Err(RustSquadError::ShapeMismatch(_)) => {}
        _ => panic!("expected a shape mismatch error"),
    }

    let char_ids = Tensor::zeros(&[0, 3, 4], (Kind::Int64, Device::Cpu));
    let mask = Tensor::zeros(&[0, 3], (Kind::Int64, Device::Cpu));
    match char_encoder.forward_t(&char_ids, &mask, false) {
        Err(RustSquadError::ShapeMismatch(_)) => {}
        _ => panic!("expected a shape mismatch error"),
    }
}

#[test]
fn character_encoder_rejects_unknown_ids() {
    let vs = nn::VarStore::new(Device::Cpu);
    let config = SquadConfig::default();
    let char_encoder = CharacterEncoder::new(&vs.root() / "char_encoder", &config);
    let char_ids = Tensor::full(&[1, 2, 4], config.char_vocab_size, (Kind::Int64, Device::Cpu));

    match char_encoder.forward_t(&char_ids, &mask_from_lengths(&[2], 2), false) {
        Err(RustSquadError::InvalidInput(_)) => {}
        _ => panic!("expected an invalid input error"),
    }
}
