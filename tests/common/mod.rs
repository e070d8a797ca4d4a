//! Shared fixture for workflow tests running against the in-memory store

#![allow(dead_code)]

use resource_lending_server::{
    config::AppConfig,
    models::{
        enums::Role,
        loan::{CreateLoan, LoanDetails},
        report::{DamageReport, ReturnLoan, SuggestionReport},
        resource::Resource,
        user::Actor,
    },
    repository::{memory::MemoryStore, Repository},
    services::Services,
};

pub const DOCENTE_DNI: &str = "45678912";

pub struct Fixture {
    pub store: MemoryStore,
    pub repository: Repository,
    pub services: Services,
    pub admin: Actor,
    pub docente: Actor,
    pub area_id: i32,
    pub grade_id: i32,
    pub section_id: i32,
}

impl Fixture {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let admin = store.add_user("10203040", "María Quispe", Role::Administrador);
        let docente = store.add_user(DOCENTE_DNI, "Ana Torres", Role::Docente);
        let area = store.add_area("Ciencias");
        let grade = store.add_grade("3ro");
        let section = store.add_section("B");

        let repository = Repository::in_memory(store.clone());
        let services = Services::new(repository.clone(), &AppConfig::default());

        Self {
            store,
            repository,
            services,
            admin: Actor::new(admin.id, admin.role),
            docente: Actor::new(docente.id, docente.role),
            area_id: area.id,
            grade_id: grade.id,
            section_id: section.id,
        }
    }

    pub fn resources(&self, names: &[&str]) -> Vec<Resource> {
        names.iter().map(|name| self.store.add_resource(1, name)).collect()
    }

    pub fn loan_request(&self, resources: &[Resource]) -> CreateLoan {
        CreateLoan {
            teacher_id: self.docente.id,
            area_id: self.area_id,
            grade_id: self.grade_id,
            section_id: self.section_id,
            resource_ids: resources.iter().map(|r| r.id).collect(),
            notes: None,
        }
    }

    /// Loan created directly by the administrator, already active
    pub async fn active_loan(&self, resources: &[Resource]) -> LoanDetails {
        self.services
            .loans
            .create_loan(self.admin, self.loan_request(resources))
            .await
            .unwrap()
    }

    pub async fn resource(&self, id: i32) -> Resource {
        self.repository.resources.get_by_id(id).await.unwrap()
    }
}

pub fn damage(resource_id: i32, damages: &[&str]) -> DamageReport {
    DamageReport {
        resource_id,
        damages: damages.iter().map(|d| d.to_string()).collect(),
        notes: None,
    }
}

pub fn suggestion(resource_id: i32, suggestions: &[&str]) -> SuggestionReport {
    SuggestionReport {
        resource_id,
        suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
        notes: None,
    }
}

pub fn return_request(damage_reports: Vec<DamageReport>, suggestions: Vec<SuggestionReport>) -> ReturnLoan {
    ReturnLoan {
        dni: DOCENTE_DNI.to_string(),
        damage_reports,
        suggestions,
    }
}
