pub mod application;
pub mod cli;
pub mod connector;
pub mod domain;

pub use application::{
    AdClassifier, AnalyzeBatchUseCase, AssistantApi, BatchReport, ClassifyAdUseCase,
    DocumentStore, PollClock, PollPolicy, RunLifecycleManager,
};

pub use connector::{
    Container, ContainerConfig, DuckdbDocumentStore, InMemoryDocumentStore, ManualClock,
    MockAssistantClient, MockOperation, OpenAiAssistantClient, TokioClock,
};

pub use domain::{
    Assistant, AssistantDefinition, ClassificationOutcome, ClassificationResult, Document,
    DomainError, Filter, Message, Party, Role, Run, RunOptions, RunStatus, Session, Thread,
};
