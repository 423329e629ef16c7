pub mod config;
pub mod domain;
pub mod errors;
pub mod matching;
pub mod notes;
pub mod webhook;

pub use domain::customer::{Customer, CustomerId};
pub use domain::job::{
    ChecklistItem, ChecklistUpdate, Job, JobId, JobNote, JobNumber, JobStatus, JobType, NoteStatus,
};
pub use domain::payment::{
    InvoiceLineItem, PaymentLedgerEntry, PaymentStage, Proposal, ProposalId, ProposalStatus,
    StagePayment, StageTransition, TaxBreakdown,
};
pub use domain::submission::{Submission, SubmissionId, SubmissionReceipt, Technician};
pub use domain::sync::{SyncRun, SyncRunStatus, SyncTrigger};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use matching::{
    address_similarity, normalize_address, similarity, AddressCandidate, CandidateResolver,
    ScoredCandidate,
};
