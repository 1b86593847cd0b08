use image::DynamicImage;
use ndarray::Array1;
use std::path::Path;
use tch::{CModule, Device, Kind, Tensor};

use crate::error::Result;

// CLIP preprocessing constants (ViT-B/32)
const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// A struct to handle image embeddings using a pre-trained encoder
pub struct EmbeddingModel {
    module: CModule,
    device: Device,
}

impl std::fmt::Debug for EmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingModel")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl EmbeddingModel {
    /// Load a TorchScript image encoder from a checkpoint file
    pub fn load<P: AsRef<Path>>(checkpoint: P) -> Result<Self> {
        let device = Device::cuda_if_available();
        let mut module = CModule::load_on_device(checkpoint.as_ref(), device)?;
        module.set_eval();

        Ok(Self { module, device })
    }

    /// Compute an L2-normalized embedding for an image
    pub fn compute_embedding(&self, img: &DynamicImage) -> Result<Array1<f32>> {
        // Preprocess the image
        let input_tensor = self.preprocess_image(img);

        // Move tensor to the same device as the model
        let input_tensor = input_tensor.to(self.device);

        // Forward pass
        let output = self.module.forward_ts(&[&input_tensor])?;

        // Drop the batch dimension and convert to ndarray
        let output = output.squeeze_dim(0).to_device(Device::Cpu);
        let embedding = Vec::<f32>::from(output);

        Ok(l2_normalize(Array1::from(embedding)))
    }

    /// Preprocess an image for the encoder
    fn preprocess_image(&self, img: &DynamicImage) -> Tensor {
        // Resize to 224x224 (CLIP input size)
        let img = img.resize_exact(224, 224, image::imageops::FilterType::Triangle);

        // Convert to RGB if needed
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        // Channel-first layout, values in [0, 1]
        let mut data = vec![0f32; (3 * width * height) as usize];
        let plane = (width * height) as usize;

        for (x, y, pixel) in rgb_img.enumerate_pixels() {
            let offset = (y * width + x) as usize;
            data[offset] = pixel[0] as f32 / 255.0;
            data[plane + offset] = pixel[1] as f32 / 255.0;
            data[2 * plane + offset] = pixel[2] as f32 / 255.0;
        }

        let tensor = Tensor::of_slice(&data)
            .reshape(&[3, 224, 224])
            .to_kind(Kind::Float);

        // Normalize with CLIP channel statistics
        let mean = Tensor::of_slice(&CLIP_MEAN)
            .view([3, 1, 1])
            .to_kind(Kind::Float);
        let std = Tensor::of_slice(&CLIP_STD)
            .view([3, 1, 1])
            .to_kind(Kind::Float);

        let normalized = (tensor - &mean) / &std;

        // Add batch dimension [1, 3, 224, 224]
        normalized.unsqueeze(0)
    }

    /// Compute cosine similarity between two embeddings
    pub fn cosine_similarity(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
        let dot_product = a.dot(b);
        let norm_a = a.dot(a).sqrt();
        let norm_b = b.dot(b).sqrt();

        if norm_a > 0.0 && norm_b > 0.0 {
            (dot_product / (norm_a * norm_b)).min(1.0).max(-1.0)
        } else {
            0.0
        }
    }
}

/// Scale a vector to unit length; zero vectors pass through unchanged
pub fn l2_normalize(v: Array1<f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt();
    if norm > 0.0 {
        v / norm
    } else {
        v
    }
}
