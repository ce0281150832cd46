//! Tract-powered YOLOv8 detector (pure Rust, CPU).

use std::path::Path;

use log::debug;
use ndarray::Array2;
use tract_onnx::prelude::*;
use vigil_common::{Detection, Frame};
use vigil_preprocess::Preprocessor;

use crate::{decode, DecodeConfig, DetectError, Detector, Result};

fn model_err(e: TractError) -> DetectError {
    DetectError::Model(format!("{e:#}"))
}

pub struct TractYolo {
    model: RunnableModel<TypedFact, Box<dyn TypedOp>, TypedModel>,
    preprocessor: Preprocessor,
    config: DecodeConfig,
    name: String,
}

impl TractYolo {
    /// Load and optimise an ONNX export with a fixed `1x3xSxS` input.
    pub fn new(
        model_path: impl AsRef<Path>,
        input_size: u32,
        config: DecodeConfig,
    ) -> Result<Self> {
        let path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|m| {
                m.with_input_fact(
                    0,
                    InferenceFact::dt_shape(f32::datum_type(), tvec![1, 3, side, side]),
                )
            })
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(model_err)?;

        Ok(Self {
            model,
            preprocessor: Preprocessor::new(input_size),
            config,
            name: format!("tract:{}", path.display()),
        })
    }
}

impl Detector for TractYolo {
    fn predict(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let pre = self.preprocessor.run(frame)?;
        let side = self.preprocessor.size() as usize;

        // tract links its own ndarray, so cross over through a flat buffer
        let nchw = pre.to_nchw();
        let data: Vec<f32> = nchw.iter().copied().collect();
        let input = Tensor::from_shape(&[1, 3, side, side], &data).map_err(model_err)?;

        let outputs = self.model.run(tvec![input.into()]).map_err(model_err)?;
        let view = outputs[0].to_array_view::<f32>().map_err(model_err)?;
        let shape = view.shape().to_vec();
        let (rows, cols) = match shape.as_slice() {
            [1, r, c] | [r, c] => (*r, *c),
            _ => return Err(DetectError::InvalidOutputShape(shape)),
        };
        let flat: Vec<f32> = view.iter().copied().collect();
        let head = Array2::from_shape_vec((rows, cols), flat)
            .map_err(|_| DetectError::InvalidOutputShape(shape.clone()))?;

        let dets = decode(head.view(), &pre.letterbox, &self.config)?;
        debug!("{}: {} detection(s)", self.name, dets.len());
        Ok(dets)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
