use anyhow::Result;
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{Module, VarBuilder, VarMap};
use seqnet::{
    attention::{self, POINTER_SCOPE, SUMMARY_SCOPE},
    encoder::{Encoder, EncoderConfig},
    layers::{self, masked_softmax},
    losses::{self, masked_mean},
};

const VOCAB: usize = 20;
const EMBED: usize = 6;
const HIDDEN: usize = 4;

struct Batch {
    passage: Tensor,
    question: Tensor,
    start: Tensor,
    end: Tensor,
}

fn batch(device: &Device) -> Result<Batch> {
    let passage = Tensor::new(
        &[[3u32, 7, 1, 9, 4, 2], [5, 8, 11, 0, 0, 0]],
        device,
    )?;
    let question = Tensor::new(&[[12u32, 6, 0, 0], [13, 14, 15, 16]], device)?;
    let start = Tensor::new(&[1u32, 0], device)?;
    let end = Tensor::new(&[3u32, 2], device)?;
    Ok(Batch {
        passage,
        question,
        start,
        end,
    })
}

/// Embeds, encodes, attends and points; returns `(start_probs, end_probs, passage_mask)`.
fn span_probabilities(batch: &Batch, vb: &VarBuilder) -> Result<(Tensor, Tensor, Tensor)> {
    let (p_mask, p_len) = layers::tensor_to_mask(&batch.passage)?;
    let (q_mask, q_len) = layers::tensor_to_mask(&batch.question)?;

    let embedding = candle_nn::embedding(VOCAB, EMBED, vb.pp("word_embedding"))?;
    let p_emb = embedding.forward(&batch.passage)?;
    let q_emb = embedding.forward(&batch.question)?;

    let config = EncoderConfig::from_tag("bigru", HIDDEN)?;
    let encoder = Encoder::new(config, EMBED, vb.pp("encoding"))?;
    let p_enc = encoder.forward(&p_emb, &p_len)?.outputs;
    let q_enc = encoder.forward(&q_emb, &q_len)?.outputs;

    let context = attention::dot_attention(&p_enc, &q_enc, &q_mask, HIDDEN, 1.0, vb.pp("attention"))?;
    let fused = Tensor::cat(&[&p_enc, &context], 2)?;

    let init = attention::summary(&q_enc, HIDDEN, &q_mask, 1.0, vb.pp(SUMMARY_SCOPE))?;
    let (next, start) = attention::pointer(&fused, &init, HIDDEN, &p_mask, vb.pp(POINTER_SCOPE))?;
    let next = next.narrow(1, 0, 2 * HIDDEN)?;
    let (_, end) = attention::pointer(&fused, &next, HIDDEN, &p_mask, vb.pp(POINTER_SCOPE))?;
    Ok((start, end, p_mask))
}

#[test]
fn reading_comprehension_pipeline_produces_masked_distributions() -> Result<()> {
    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let batch = batch(&device)?;

    let (start, end, p_mask) = span_probabilities(&batch, &vb)?;
    assert_eq!(start.dims(), &[2, 6]);
    assert_eq!(end.dims(), &[2, 6]);

    for probs in [&start, &end] {
        for total in probs.sum(D::Minus1)?.to_vec1::<f32>()? {
            assert!((total - 1.0).abs() < 1e-5);
        }
        let leaked = probs
            .mul(&p_mask.affine(-1.0, 1.0)?)?
            .sum_all()?
            .to_vec0::<f32>()?;
        assert_eq!(leaked, 0.0);
    }
    Ok(())
}

#[test]
fn pointer_scope_is_shared_between_start_and_end() -> Result<()> {
    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let batch = batch(&device)?;

    span_probabilities(&batch, &vb)?;
    let data = varmap.data().lock().unwrap();
    let pointer_vars = data.keys().filter(|name| name.starts_with("pointer.")).count();
    assert_eq!(pointer_vars, 3);
    assert!(data.contains_key("summary.summary_sj.weight"));
    assert!(data.contains_key("attention.value.weight"));
    assert!(data.contains_key("attention.memory.weight"));
    assert!(data.contains_key("encoding.bw.cell_0.gates.kernel"));
    Ok(())
}

#[test]
fn span_loss_backpropagates_into_the_encoder() -> Result<()> {
    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let batch = batch(&device)?;

    let (start, end, _) = span_probabilities(&batch, &vb)?;
    let rows = Tensor::ones(2, DType::F32, &device)?;
    let start_loss = losses::sparse_cross_entropy(&start, &batch.start, &rows)?;
    let end_loss = losses::sparse_cross_entropy(&end, &batch.end, &rows)?;
    let loss = masked_mean(&start_loss.add(&end_loss)?, &rows)?;

    let value = loss.to_vec0::<f32>()?;
    assert!(value.is_finite() && value > 0.0);

    let grads = loss.backward()?;
    let data = varmap.data().lock().unwrap();
    let kernel = data["encoding.fw.cell_0.candidate.kernel"].as_tensor();
    let grad = grads
        .get(kernel)
        .expect("encoder kernel receives a gradient");
    let magnitude = grad.abs()?.sum_all()?.to_vec0::<f32>()?;
    assert!(magnitude > 0.0);
    Ok(())
}

#[test]
fn masked_softmax_matches_pointer_restriction_on_padding() -> Result<()> {
    let device = Device::Cpu;
    let (mask, lengths) = layers::tensor_to_mask(&Tensor::new(&[[4u32, 0, 9, 0]], &device)?)?;
    assert_eq!(lengths.to_vec1::<u32>()?, vec![2]);

    let scores = Tensor::new(&[[0.3f32, 5.0, -0.2, 7.0]], &device)?;
    let probs = masked_softmax(&scores, &mask)?.to_vec2::<f32>()?;
    assert_eq!(probs[0][1], 0.0);
    assert_eq!(probs[0][3], 0.0);
    assert!((probs[0][0] + probs[0][2] - 1.0).abs() < 1e-6);
    Ok(())
}
