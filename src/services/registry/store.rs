use std::collections::{BTreeMap, HashMap};

use super::types::ServiceRecord;

/// 按注册顺序排列的实例存储
///
/// 记录按插入序号保存在 `BTreeMap` 中，`index` 把 service_id 映射到序号。
/// 同一 service_id 重新注册时沿用原序号，迭代位置不变。
#[derive(Debug, Default)]
pub(crate) struct RegistryStore {
    next_seq: u64,
    records: BTreeMap<u64, ServiceRecord>,
    index: HashMap<String, u64>,
}

impl RegistryStore {
    /// 插入或覆盖记录，返回是否覆盖了已有记录
    pub fn upsert(&mut self, record: ServiceRecord) -> bool {
        if let Some(seq) = self.index.get(&record.service_id) {
            self.records.insert(*seq, record);
            return true;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(record.service_id.clone(), seq);
        self.records.insert(seq, record);
        false
    }

    pub fn contains(&self, service_id: &str) -> bool {
        self.index.contains_key(service_id)
    }

    pub fn get_mut(&mut self, service_id: &str) -> Option<&mut ServiceRecord> {
        let seq = self.index.get(service_id)?;
        self.records.get_mut(seq)
    }

    pub fn remove(&mut self, service_id: &str) -> Option<ServiceRecord> {
        let seq = self.index.remove(service_id)?;
        self.records.remove(&seq)
    }

    pub fn values(&self) -> impl Iterator<Item = &ServiceRecord> {
        self.records.values()
    }

    /// 删除所有满足条件的记录并返回被删除的记录
    pub fn evict_where<F>(&mut self, mut should_evict: F) -> Vec<ServiceRecord>
    where
        F: FnMut(&ServiceRecord) -> bool,
    {
        let expired: Vec<u64> = self
            .records
            .iter()
            .filter(|(_, record)| should_evict(record))
            .map(|(seq, _)| *seq)
            .collect();

        expired
            .into_iter()
            .filter_map(|seq| {
                let record = self.records.remove(&seq)?;
                self.index.remove(&record.service_id);
                Some(record)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}
