// 该文件是 Guobang （过磅） 项目的一部分。
// src/frame.rs - 张量容器定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use thiserror::Error;

const RGB_CHANNELS: usize = 3;

/// 平面化的归一化输入张量，布局 [C][H][W]，值域 [0, 1]。
///
/// 不变量：data.len() == 3 × side × side。
#[derive(Debug, Clone)]
pub struct PlanarTensor {
  data: Box<[f32]>,
  side: u32,
}

impl PlanarTensor {
  /// 创建全零张量
  pub fn zeros(side: u32) -> Self {
    let size = RGB_CHANNELS * (side as usize) * (side as usize);
    PlanarTensor {
      data: vec![0.0f32; size].into_boxed_slice(),
      side,
    }
  }

  pub fn side(&self) -> u32 {
    self.side
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  /// 单个通道平面的元素数
  pub fn plane_len(&self) -> usize {
    (self.side as usize) * (self.side as usize)
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn as_mut_slice(&mut self) -> &mut [f32] {
    &mut self.data
  }

  /// 读取平面 c 在 (y, x) 处的值
  pub fn at(&self, c: usize, y: usize, x: usize) -> f32 {
    let side = self.side as usize;
    self.data[c * side * side + y * side + x]
  }
}

#[derive(Error, Debug)]
pub enum TensorShapeError {
  #[error("输出张量长度不匹配: 期望 {expected} (= {channels}×{height}×{width})，实际 {actual}")]
  LengthMismatch {
    expected: usize,
    channels: usize,
    height: usize,
    width: usize,
    actual: usize,
  },
  #[error("输出张量维度为零: {channels}×{height}×{width}")]
  ZeroDim {
    channels: usize,
    height: usize,
    width: usize,
  },
}

/// 推理引擎返回的原始输出张量，维度 [1, C, H, W]（batch 固定为 1）。
#[derive(Debug, Clone)]
pub struct OutputTensor {
  data: Box<[f32]>,
  channels: usize,
  height: usize,
  width: usize,
}

impl OutputTensor {
  pub fn new(
    data: Vec<f32>,
    channels: usize,
    height: usize,
    width: usize,
  ) -> Result<Self, TensorShapeError> {
    if channels == 0 || height == 0 || width == 0 {
      return Err(TensorShapeError::ZeroDim {
        channels,
        height,
        width,
      });
    }
    let expected = channels * height * width;
    if data.len() != expected {
      return Err(TensorShapeError::LengthMismatch {
        expected,
        channels,
        height,
        width,
        actual: data.len(),
      });
    }
    Ok(OutputTensor {
      data: data.into_boxed_slice(),
      channels,
      height,
      width,
    })
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  /// 单个通道平面的元素数（H×W）
  pub fn plane_len(&self) -> usize {
    self.height * self.width
  }

  /// 读取通道 c 在网格 (y, x) 处的值
  pub fn at(&self, c: usize, y: usize, x: usize) -> f32 {
    self.data[c * self.plane_len() + y * self.width + x]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn planar_tensor_invariant() {
    let tensor = PlanarTensor::zeros(416);
    assert_eq!(tensor.as_slice().len(), 3 * 416 * 416);
    assert_eq!(tensor.plane_len(), 416 * 416);
  }

  #[test]
  fn planar_tensor_indexing() {
    let mut tensor = PlanarTensor::zeros(4);
    tensor.as_mut_slice()[2 * 16 + 1 * 4 + 3] = 0.5;
    assert_eq!(tensor.at(2, 1, 3), 0.5);
  }

  #[test]
  fn output_tensor_rejects_length_mismatch() {
    let result = OutputTensor::new(vec![0.0; 10], 2, 3, 3);
    assert!(matches!(
      result,
      Err(TensorShapeError::LengthMismatch { expected: 18, .. })
    ));
  }

  #[test]
  fn output_tensor_rejects_zero_dim() {
    assert!(matches!(
      OutputTensor::new(vec![], 0, 3, 3),
      Err(TensorShapeError::ZeroDim { .. })
    ));
  }

  #[test]
  fn output_tensor_indexing() {
    let mut data = vec![0.0f32; 2 * 2 * 2];
    // 通道 1，(y=1, x=0)
    data[1 * 4 + 1 * 2] = 7.0;
    let tensor = OutputTensor::new(data, 2, 2, 2).unwrap();
    assert_eq!(tensor.at(1, 1, 0), 7.0);
  }
}
