use std::path::PathBuf;

use futures_util::{SinkExt, StreamExt};
use hostcon_protocol::relay::MAX_RELAY_LINE_BYTES;
use hostcon_protocol::{RelayRequest, RelayResponse};
use serde::de::DeserializeOwned;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

use super::{RelayError, RelayResult};

/// Satellite-side connection to a session relay.
pub struct RelayClient {
    reader: FramedRead<tokio::net::tcp::OwnedReadHalf, LinesCodec>,
    writer: FramedWrite<tokio::net::tcp::OwnedWriteHalf, LinesCodec>,
}

impl RelayClient {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> RelayResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: FramedRead::new(
                read_half,
                LinesCodec::new_with_max_length(MAX_RELAY_LINE_BYTES),
            ),
            writer: FramedWrite::new(write_half, LinesCodec::new()),
        })
    }

    /// Send a request and read its reply.
    ///
    /// Remote errors come back as [`RelayError::Remote`].
    pub async fn request(
        &mut self,
        request: &RelayRequest,
    ) -> RelayResult<Option<serde_json::Value>> {
        self.writer.send(serde_json::to_string(request)?).await?;
        let line = self.reader.next().await.ok_or(RelayError::Disconnected)??;
        match serde_json::from_str::<RelayResponse>(&line)? {
            RelayResponse::Ok { data } => Ok(data),
            RelayResponse::Error { message, code } => Err(RelayError::Remote { code, message }),
        }
    }

    async fn get<T: DeserializeOwned>(&mut self, request: RelayRequest) -> RelayResult<T> {
        // A null value arrives as a reply without data.
        let data = self.request(&request).await?.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(data)
            .map_err(|e| RelayError::Protocol(format!("unexpected reply to {request:?}: {e}")))
    }

    pub async fn get_plugin(&mut self) -> RelayResult<String> {
        self.get(RelayRequest::GetPlugin).await
    }

    pub async fn get_request_str(&mut self) -> RelayResult<String> {
        self.get(RelayRequest::GetRequestStr).await
    }

    pub async fn get_opsys(&mut self) -> RelayResult<String> {
        self.get(RelayRequest::GetOpsys).await
    }

    pub async fn get_version(&mut self) -> RelayResult<String> {
        self.get(RelayRequest::GetVersion).await
    }

    pub async fn get_serialnumber(&mut self) -> RelayResult<u64> {
        self.get(RelayRequest::GetSerialnumber).await
    }

    pub async fn get_stage(&mut self) -> RelayResult<String> {
        self.get(RelayRequest::GetStage).await
    }

    pub async fn get_owner(&mut self) -> RelayResult<String> {
        self.get(RelayRequest::GetOwner).await
    }

    pub async fn get_permissions(&mut self) -> RelayResult<u32> {
        self.get(RelayRequest::GetPermissions).await
    }

    pub async fn get_workdir(&mut self) -> RelayResult<PathBuf> {
        self.get(RelayRequest::GetWorkdir).await
    }

    pub async fn get_selection(&mut self) -> RelayResult<Vec<String>> {
        self.get(RelayRequest::GetSelection).await
    }

    pub async fn get_com(&mut self) -> RelayResult<Option<u16>> {
        self.get(RelayRequest::GetCom).await
    }

    pub async fn get_connection_info(&mut self) -> RelayResult<Option<PathBuf>> {
        self.get(RelayRequest::GetConnectionInfo).await
    }

    /// Read a public attribute by name.
    pub async fn get_attr(&mut self, name: &str) -> RelayResult<serde_json::Value> {
        self.get(RelayRequest::GetAttr {
            name: name.to_string(),
        })
        .await
    }

    /// Push text into the console's output stream.
    pub async fn stdout_relay(&mut self, text: &str) -> RelayResult<()> {
        self.request(&RelayRequest::StdoutRelay {
            text: text.to_string(),
        })
        .await?;
        Ok(())
    }
}
