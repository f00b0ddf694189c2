//! Per-actor-type aggregation policies.
//!
//! Every actor type aggregates with the same engine; what differs is the
//! business dimension children are grouped by, the kinds that take part,
//! their short labels, and how the parent summary is presented. Each of
//! those lives in one static [`AggregationPolicy`].

use portal_core::types::GroupKey;
use portal_entity::{ActorType, SubjectKind};

/// Label used for aggregatable kinds that have no dedicated label.
pub const DEFAULT_KIND_LABEL: &str = "Notification";

/// One aggregatable kind and its short label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindLabel {
    /// Kind code as written by producers.
    pub code: &'static str,
    /// Short French label shown in parent summaries.
    pub label: &'static str,
}

const fn kind(code: &'static str, label: &'static str) -> KindLabel {
    KindLabel { code, label }
}

/// The aggregation strategy for one actor type.
#[derive(Debug, PartialEq, Eq)]
pub struct AggregationPolicy {
    /// Actor type this policy applies to.
    pub actor_type: ActorType,
    /// Grouping dimensions, most specific first.
    pub dimensions: &'static [SubjectKind],
    /// Kind code written on parents.
    pub summary_kind: &'static str,
    /// Deep-link prefix; the group key is appended.
    pub link_prefix: &'static str,
    /// Noun counted in the parent title.
    pub noun: &'static str,
    /// Aggregatable kinds.
    pub kinds: &'static [KindLabel],
}

impl AggregationPolicy {
    /// Whether `kind` takes part in aggregation.
    pub fn is_aggregatable(&self, kind: &str) -> bool {
        self.kinds.iter().any(|k| k.code == kind)
    }

    /// Short label of `kind`.
    pub fn label_for(&self, kind: &str) -> &'static str {
        self.kinds
            .iter()
            .find(|k| k.code == kind)
            .map_or(DEFAULT_KIND_LABEL, |k| k.label)
    }

    /// Deep link of the parent for `group_key`.
    pub fn action_url(&self, group_key: &GroupKey) -> String {
        format!("{}{}", self.link_prefix, group_key)
    }

    /// The primary grouping dimension.
    pub fn primary_dimension(&self) -> SubjectKind {
        self.dimensions[0]
    }
}

/// The policy of `actor_type`.
pub fn policy_for(actor_type: ActorType) -> &'static AggregationPolicy {
    match actor_type {
        ActorType::Client => &CLIENT_POLICY,
        ActorType::Expert => &EXPERT_POLICY,
        ActorType::Apporteur => &APPORTEUR_POLICY,
        ActorType::Admin => &ADMIN_POLICY,
    }
}

/// Clients see one summary per case file.
pub static CLIENT_POLICY: AggregationPolicy = AggregationPolicy {
    actor_type: ActorType::Client,
    dimensions: &[SubjectKind::Dossier],
    summary_kind: "client_dossier_actions_summary",
    link_prefix: "/client/dossiers/",
    noun: "action",
    kinds: &[
        kind("client_document_uploaded", "Document déposé"),
        kind("client_document_validated", "Document validé"),
        kind("client_document_rejected", "Document rejeté"),
        kind("client_document_expiring", "Document expire"),
        kind("client_document_expired", "Document expiré"),
        kind("client_expert_assigned", "Expert assigné"),
        kind("client_expert_unassigned", "Expert retiré"),
        kind("client_deadline_reminder", "Deadline proche"),
        kind("client_deadline_overdue", "Deadline dépassée"),
        kind("client_workflow_completed", "Étape complétée"),
        kind("client_workflow_stuck", "Action requise"),
        kind("ticpe_client_eligibility_confirmed", "Éligibilité confirmée"),
        kind("ticpe_client_documents_validated", "Documents validés"),
        kind("ticpe_client_audit_completed", "Audit terminé"),
        kind("urssaf_client_eligibility_confirmed", "Éligibilité confirmée"),
        kind("urssaf_client_documents_validated", "Documents validés"),
        kind("urssaf_client_audit_completed", "Audit terminé"),
        kind("foncier_client_eligibility_confirmed", "Éligibilité confirmée"),
        kind("foncier_client_documents_validated", "Documents validés"),
        kind("foncier_client_audit_completed", "Audit terminé"),
        kind("msa_client_eligibility_confirmed", "Éligibilité confirmée"),
        kind("msa_client_documents_validated", "Documents validés"),
        kind("msa_client_audit_completed", "Audit terminé"),
        kind("dfs_client_eligibility_confirmed", "Éligibilité confirmée"),
        kind("dfs_client_documents_validated", "Documents validés"),
        kind("dfs_client_audit_completed", "Audit terminé"),
    ],
};

/// Experts see one summary per client, counting case files.
pub static EXPERT_POLICY: AggregationPolicy = AggregationPolicy {
    actor_type: ActorType::Expert,
    dimensions: &[SubjectKind::Client],
    summary_kind: "expert_client_actions_summary",
    link_prefix: "/expert/clients/",
    noun: "dossier",
    kinds: &[
        kind("expert_new_assignment", "Nouveau dossier"),
        kind("expert_deadline_approaching", "Échéance proche"),
        kind("expert_deadline_overdue", "Échéance dépassée"),
        kind("expert_document_required", "Document requis"),
        kind("expert_workflow_step_completed", "Étape complétée"),
        kind("expert_workflow_escalated", "Escalade"),
        kind("expert_client_message", "Message client"),
        kind("ticpe_expert_dossier_assigned", "TICPE"),
        kind("ticpe_expert_documents_ready", "TICPE"),
        kind("ticpe_expert_audit_due", "TICPE"),
        kind("urssaf_expert_dossier_assigned", "URSSAF"),
        kind("urssaf_expert_documents_ready", "URSSAF"),
        kind("urssaf_expert_audit_due", "URSSAF"),
        kind("foncier_expert_dossier_assigned", "Foncier"),
        kind("foncier_expert_documents_ready", "Foncier"),
        kind("foncier_expert_audit_due", "Foncier"),
        kind("msa_expert_dossier_assigned", "MSA"),
        kind("msa_expert_documents_ready", "MSA"),
        kind("msa_expert_audit_due", "MSA"),
        kind("dfs_expert_dossier_assigned", "DFS"),
        kind("dfs_expert_documents_ready", "DFS"),
        kind("dfs_expert_audit_due", "DFS"),
    ],
};

/// Apporteurs see one summary per prospect, or per client once converted.
pub static APPORTEUR_POLICY: AggregationPolicy = AggregationPolicy {
    actor_type: ActorType::Apporteur,
    dimensions: &[SubjectKind::Prospect, SubjectKind::Client],
    summary_kind: "apporteur_prospect_actions_summary",
    link_prefix: "/apporteur/prospects/",
    noun: "action",
    kinds: &[
        kind("apporteur_nouveau_prospect", "Nouveau prospect"),
        kind("apporteur_prospect_qualifie", "Prospect qualifié"),
        kind("apporteur_prospect_converti", "Converti en client"),
        kind("apporteur_prospect_perdu", "Prospect perdu"),
        kind("apporteur_commission_calculee", "Commission calculée"),
        kind("apporteur_commission_payee", "Commission payée"),
        kind("apporteur_expert_assigne", "Expert assigné"),
        kind("apporteur_rdv_confirme", "RDV confirmé"),
        kind("apporteur_rdv_programme", "RDV programmé"),
        kind("apporteur_rappel_suivi", "Rappel suivi"),
        kind("apporteur_formation_disponible", DEFAULT_KIND_LABEL),
        kind("apporteur_document_requis", DEFAULT_KIND_LABEL),
        kind("apporteur_document_valide", DEFAULT_KIND_LABEL),
        kind("apporteur_contrat_signe", DEFAULT_KIND_LABEL),
        kind("apporteur_client_actif", DEFAULT_KIND_LABEL),
        kind("nouveau_prospect", "Nouveau prospect"),
        kind("commission_payee", "Commission payée"),
        kind("commission_calculee", "Commission calculée"),
        kind("rdv_confirme", "RDV confirmé"),
        kind("rdv_programme", "RDV programmé"),
        kind("rappel_suivi", "Rappel suivi"),
        kind("expert_assigne", "Expert assigné"),
        kind("lead_to_treat", "Lead à traiter"),
        kind("contact_message", "Message contact"),
    ],
};

/// Admins see one summary per client, or per prospect before signature.
pub static ADMIN_POLICY: AggregationPolicy = AggregationPolicy {
    actor_type: ActorType::Admin,
    dimensions: &[SubjectKind::Client, SubjectKind::Prospect],
    summary_kind: "admin_client_actions_summary",
    link_prefix: "/admin/clients/",
    noun: "action",
    kinds: &[
        kind("admin_document_validation_required", "Validation document"),
        kind("admin_workflow_escalation", "Escalade workflow"),
        kind("admin_new_client_registration", "Nouveau client"),
        kind("admin_client_complaint", "Réclamation client"),
        kind("admin_expert_complaint", "Réclamation expert"),
        kind("admin_payment_issue", "Problème paiement"),
        kind("admin_action_required", "Action requise"),
    ],
};
