//! Closed status enums shared by the domain models
//!
//! Every enum is persisted as its display label (TEXT column), so the stored
//! values stay readable by the collaborating dashboards.

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, Postgres};
use utoipa::ToSchema;

/// Implements label conversions and the sqlx TEXT mapping for a status enum
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $label:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label $(| $alias)* => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }

        impl sqlx::Type<Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<Postgres>>::type_info()
            }
        }

        impl<'r> Decode<'r, Postgres> for $name {
            fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let s: &str = Decode::<Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl Encode<'_, Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
                <&str as Encode<Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Role of the acting user, as supplied by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Role {
    Administrador,
    Docente,
}

text_enum!(Role {
    Administrador => "Administrador",
    Docente => "Docente",
});

// ---------------------------------------------------------------------------
// LoanStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum LoanStatus {
    Pendiente,
    Activo,
    Devuelto,
    Atrasado,
    Rechazado,
}

text_enum!(LoanStatus {
    Pendiente => "Pendiente",
    Activo => "Activo",
    Devuelto => "Devuelto",
    Atrasado => "Atrasado",
    Rechazado => "Rechazado",
});

impl LoanStatus {
    pub const ALL: [LoanStatus; 5] = [
        LoanStatus::Pendiente,
        LoanStatus::Activo,
        LoanStatus::Devuelto,
        LoanStatus::Atrasado,
        LoanStatus::Rechazado,
    ];

    /// Returned or rejected loans accept no further transitions
    pub fn is_closed(&self) -> bool {
        matches!(self, LoanStatus::Devuelto | LoanStatus::Rechazado)
    }

    /// Resources of the loan are out with the borrower
    pub fn is_open(&self) -> bool {
        matches!(self, LoanStatus::Activo | LoanStatus::Atrasado)
    }
}

// ---------------------------------------------------------------------------
// ResourceStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ResourceStatus {
    Disponible,
    #[serde(rename = "En Préstamo")]
    EnPrestamo,
    #[serde(rename = "En Mantenimiento")]
    EnMantenimiento,
    #[serde(rename = "Dañado")]
    Danado,
    #[serde(rename = "En Reparación")]
    EnReparacion,
    #[serde(rename = "Parcialmente Reparado")]
    ParcialmenteReparado,
    #[serde(rename = "Esperando Repuestos")]
    EsperandoRepuestos,
    #[serde(rename = "Reparado - Pendiente de Prueba")]
    ReparadoPendientePrueba,
}

text_enum!(ResourceStatus {
    Disponible => "Disponible",
    EnPrestamo => "En Préstamo",
    EnMantenimiento => "En Mantenimiento",
    Danado => "Dañado",
    EnReparacion => "En Reparación",
    ParcialmenteReparado => "Parcialmente Reparado",
    EsperandoRepuestos => "Esperando Repuestos",
    ReparadoPendientePrueba => "Reparado - Pendiente de Prueba",
});

impl ResourceStatus {
    pub const ALL: [ResourceStatus; 8] = [
        ResourceStatus::Disponible,
        ResourceStatus::EnPrestamo,
        ResourceStatus::EnMantenimiento,
        ResourceStatus::Danado,
        ResourceStatus::EnReparacion,
        ResourceStatus::ParcialmenteReparado,
        ResourceStatus::EsperandoRepuestos,
        ResourceStatus::ReparadoPendientePrueba,
    ];

    /// The resource is out of circulation because of damage or repair work
    pub fn is_maintenance(&self) -> bool {
        !matches!(self, ResourceStatus::Disponible | ResourceStatus::EnPrestamo)
    }
}

// ---------------------------------------------------------------------------
// MaintenanceStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum MaintenanceStatus {
    Pendiente,
    #[serde(rename = "En Proceso", alias = "En Reparación")]
    EnProceso,
    Completado,
}

text_enum!(MaintenanceStatus {
    Pendiente => "Pendiente",
    EnProceso => "En Proceso" | "En Reparación",
    Completado => "Completado",
});

impl MaintenanceStatus {
    pub fn is_open(&self) -> bool {
        !matches!(self, MaintenanceStatus::Completado)
    }
}

// ---------------------------------------------------------------------------
// MaintenanceType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum MaintenanceType {
    Correctivo,
    Preventivo,
}

text_enum!(MaintenanceType {
    Correctivo => "Correctivo",
    Preventivo => "Preventivo",
});

// ---------------------------------------------------------------------------
// NotificationPriority
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
    Critical,
}

text_enum!(NotificationPriority {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

// ---------------------------------------------------------------------------
// NotificationType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    IncidentCreated,
    IncidentEscalated,
    IncidentResolved,
}

text_enum!(NotificationType {
    IncidentCreated => "incident_created",
    IncidentEscalated => "incident_escalated",
    IncidentResolved => "incident_resolved",
});
