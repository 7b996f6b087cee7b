use std::fmt;

/// Opaque token identifying one activity or workflow task with the server.
/// Round-trips through the bridge untouched; never inspected by core logic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TaskToken(pub Vec<u8>);

impl From<Vec<u8>> for TaskToken {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl From<TaskToken> for Vec<u8> {
    fn from(t: TaskToken) -> Self {
        t.0
    }
}

impl fmt::Display for TaskToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", base16(&self.0))
    }
}

fn base16(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// The server-assigned identifier of one execution attempt of a workflow id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RunId(pub String);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The (namespace, workflowId, runId) triple that addresses one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkflowExecution {
    pub namespace: String,
    pub workflow_id: String,
    pub run_id: String,
}
