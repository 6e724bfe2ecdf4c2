// 该文件是 Guobang （过磅） 项目的一部分。
// src/engine.rs - 推理引擎接口
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use thiserror::Error;

use crate::frame::{OutputTensor, PlanarTensor};

#[derive(Error, Debug)]
pub enum EngineError {
  #[error("推理引擎尚未就绪")]
  NotReady,
  #[error("推理执行失败: {0}")]
  Failed(anyhow::Error),
}

impl From<anyhow::Error> for EngineError {
  fn from(err: anyhow::Error) -> Self {
    EngineError::Failed(err)
  }
}

/// 推理引擎接口。
///
/// 模型权重在进程启动时加载一次，之后只读共享；引擎实例由调用方
/// 注入管线而非全局单例。执行上下文不支持并发调用的引擎用
/// [`MutexEngine`] 包装。
pub trait InferenceEngine {
  fn run(&self, input: &PlanarTensor) -> Result<OutputTensor, EngineError>;
}

/// 对非线程安全引擎的串行化包装
pub struct MutexEngine<E> {
  inner: std::sync::Mutex<E>,
}

impl<E> MutexEngine<E> {
  pub fn new(engine: E) -> Self {
    MutexEngine {
      inner: std::sync::Mutex::new(engine),
    }
  }
}

impl<E: InferenceEngine + Send> InferenceEngine for MutexEngine<E> {
  fn run(&self, input: &PlanarTensor) -> Result<OutputTensor, EngineError> {
    let guard = self
      .inner
      .lock()
      .map_err(|_| EngineError::Failed(anyhow::anyhow!("引擎锁已中毒")))?;
    guard.run(input)
  }
}

#[cfg(feature = "replay_engine")]
pub use self::replay::{ReplayEngine, ReplayEngineError};

#[cfg(feature = "replay_engine")]
mod replay {
  use thiserror::Error;
  use tracing::{debug, info};
  use url::Url;

  use super::{EngineError, InferenceEngine};
  use crate::frame::{OutputTensor, PlanarTensor, TensorShapeError};
  use crate::{FromUrl, FromUrlWithScheme};

  #[derive(Error, Debug)]
  pub enum ReplayEngineError {
    #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
    SchemeMismatch {
      expected: &'static str,
      actual: String,
    },
    #[error("缺少维度参数: {0}")]
    MissingDim(&'static str),
    #[error("维度参数无效: {name}={value}")]
    InvalidDim { name: &'static str, value: String },
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("张量文件与维度不符: {0}")]
    Shape(#[from] TensorShapeError),
  }

  /// 回放引擎：从磁盘加载一份原始 f32 输出张量（小端字节序），
  /// 对任意输入原样返回。
  ///
  /// 真实推理在磅房系统中跑在独立进程里，本引擎用抓取到的
  /// 输出做离线回归与联调。
  pub struct ReplayEngine {
    output: OutputTensor,
  }

  impl FromUrlWithScheme for ReplayEngine {
    const SCHEME: &'static str = "replay";
  }

  impl FromUrl for ReplayEngine {
    type Error = ReplayEngineError;

    /// 形如 `replay:///path/to/output.bin?c=30&h=13&w=13`
    fn from_url(url: &Url) -> Result<Self, Self::Error> {
      if url.scheme() != Self::SCHEME {
        return Err(ReplayEngineError::SchemeMismatch {
          expected: Self::SCHEME,
          actual: url.scheme().to_string(),
        });
      }

      let mut channels = None;
      let mut height = None;
      let mut width = None;
      for (key, value) in url.query_pairs() {
        let (slot, name) = match key.as_ref() {
          "c" => (&mut channels, "c"),
          "h" => (&mut height, "h"),
          "w" => (&mut width, "w"),
          _ => continue,
        };
        *slot = Some(value.parse::<usize>().map_err(|_| {
          ReplayEngineError::InvalidDim {
            name,
            value: value.to_string(),
          }
        })?);
      }
      let channels = channels.ok_or(ReplayEngineError::MissingDim("c"))?;
      let height = height.ok_or(ReplayEngineError::MissingDim("h"))?;
      let width = width.ok_or(ReplayEngineError::MissingDim("w"))?;

      info!("加载回放张量: {}", url.path());
      let bytes = std::fs::read(url.path())?;
      let data: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
      debug!(
        "回放张量: {} 个元素, 维度 [1, {}, {}, {}]",
        data.len(),
        channels,
        height,
        width
      );

      let output = OutputTensor::new(data, channels, height, width)?;
      Ok(ReplayEngine { output })
    }
  }

  impl ReplayEngine {
    /// 直接从内存数据构造，供联调与测试使用
    pub fn from_tensor(output: OutputTensor) -> Self {
      ReplayEngine { output }
    }
  }

  impl InferenceEngine for ReplayEngine {
    fn run(&self, _input: &PlanarTensor) -> Result<OutputTensor, EngineError> {
      Ok(self.output.clone())
    }
  }
}
