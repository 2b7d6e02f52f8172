// ==========================================
// 临床风险评分核心 - 干预模拟 (What-if)
// ==========================================
// 职责: 在记录副本上覆写若干字段,比较干预前后风险
// 输入: PatientRecord + 字段 → 新值 映射
// 输出: SimulationResult
// 红线: 调用方记录永不被修改;无状态;结果可逐位复现
// 规则: 按键名排序依次应用;元数据字段不可干预
// ==========================================

use crate::domain::assessment::SimulationResult;
use crate::domain::patient::{ClinicianMeta, PatientRecord};
use crate::domain::types::PatientField;
use crate::engine::error::SimulationError;
use crate::engine::risk_engine::RiskEngine;
use serde_json::Value;
use std::collections::BTreeMap;

/// 干预映射（有序，保证应用顺序确定）
pub type Modifications = BTreeMap<String, Value>;

pub struct CounterfactualSimulator<'a> {
    engine: &'a RiskEngine,
}

impl<'a> CounterfactualSimulator<'a> {
    pub fn new(engine: &'a RiskEngine) -> Self {
        Self { engine }
    }

    /// 在副本上应用干预
    ///
    /// # 返回
    /// - Err(UnknownField): 键不是临床字段
    /// - Err(ProtectedField): 键是医生元数据
    /// - Err(InvalidValue): 值类型或范围不合法
    pub fn apply(
        &self,
        record: &PatientRecord,
        modifications: &Modifications,
    ) -> Result<PatientRecord, SimulationError> {
        let mut modified = record.clone();
        for (key, value) in modifications {
            if ClinicianMeta::FIELD_NAMES.contains(&key.as_str()) {
                return Err(SimulationError::ProtectedField(key.clone()));
            }
            let field = PatientField::parse(key)
                .ok_or_else(|| SimulationError::UnknownField(key.clone()))?;

            let invalid = |source| SimulationError::InvalidValue {
                field: key.clone(),
                source,
            };
            modified.set_from_json(field, value).map_err(invalid)?;
            self.engine
                .artifact()
                .transform
                .validate_record(&modified)
                .map_err(invalid)?;
        }
        Ok(modified)
    }

    /// 干预前后风险对比
    pub fn simulate(
        &self,
        record: &PatientRecord,
        modifications: &Modifications,
    ) -> Result<SimulationResult, SimulationError> {
        let original_risk = self.engine.predict_risk(record)?;
        let modified = self.apply(record, modifications)?;
        let new_risk = self.engine.predict_risk(&modified)?;

        tracing::debug!(
            "干预模拟: 字段={:?}, 原风险={:.4}, 新风险={:.4}",
            modifications.keys().collect::<Vec<_>>(),
            original_risk,
            new_risk
        );
        Ok(SimulationResult::new(original_risk, new_risk, modified))
    }
}
