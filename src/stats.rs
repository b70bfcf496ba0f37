use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::board::BoardJob;
use crate::models::{JobStatus, Profile};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveJob {
    pub job_id: Uuid,
    pub lot_number: Option<String>,
    pub address: Option<String>,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeStats {
    pub user_id: Uuid,
    pub full_name: String,
    pub contact_number: Option<String>,
    pub total_jobs: usize,
    pub pending: usize,
    pub on_way: usize,
    pub on_site: usize,
    pub picked_up: usize,
    pub delivered: usize,
    pub active_job: Option<ActiveJob>,
}

impl EmployeeStats {
    fn new(user_id: Uuid, full_name: String) -> Self {
        Self {
            user_id,
            full_name,
            contact_number: None,
            total_jobs: 0,
            pending: 0,
            on_way: 0,
            on_site: 0,
            picked_up: 0,
            delivered: 0,
            active_job: None,
        }
    }
}

pub fn calculate_employee_stats(jobs: &[BoardJob]) -> Vec<EmployeeStats> {
    let mut order: Vec<Uuid> = Vec::new();
    let mut by_user: HashMap<Uuid, EmployeeStats> = HashMap::new();

    for entry in jobs {
        for assignee in &entry.assignees {
            let stats = by_user.entry(assignee.user_id).or_insert_with(|| {
                order.push(assignee.user_id);
                EmployeeStats::new(assignee.user_id, assignee.full_name.clone())
            });
            stats.total_jobs += 1;

            match assignee.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::OnWay => stats.on_way += 1,
                JobStatus::OnSite => stats.on_site += 1,
                JobStatus::PickedUp => stats.picked_up += 1,
                JobStatus::Delivered => stats.delivered += 1,
            }

            if assignee.status.is_active() && stats.active_job.is_none() {
                stats.active_job = Some(ActiveJob {
                    job_id: entry.job.id,
                    lot_number: entry.job.lot_number.clone(),
                    address: entry.job.address.clone(),
                    status: assignee.status,
                });
            }
        }
    }

    order
        .into_iter()
        .filter_map(|user_id| by_user.remove(&user_id))
        .collect()
}

pub fn attach_contacts(stats: &mut [EmployeeStats], profiles: &[Profile]) {
    let contacts: HashMap<Uuid, &str> = profiles
        .iter()
        .filter_map(|profile| {
            profile
                .contact_number
                .as_deref()
                .map(|number| (profile.id, number))
        })
        .collect();
    for entry in stats {
        if let Some(number) = contacts.get(&entry.user_id) {
            entry.contact_number = Some((*number).to_string());
        }
    }
}
