//! Secure copy over russh.
//!
//! Runs `scp -t <dst>` on an exec channel and drives the sink side of the
//! protocol: wait for a zero byte, send a `C0644 <size> <name>` header, wait,
//! stream the file, send a trailing zero byte, wait once more.

use std::path::Path;
use std::time::Duration;

use log::{debug, trace};
use russh::client::{Handle, Msg};
use russh::{Channel, ChannelMsg};

use super::{CopyChannel, CopyConnector};
use crate::transport::{SessionConfig, SshHandler, TransportFault, connect_ssh};

/// Opens SCP channels on a fresh SSH connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScpConnector;

impl CopyConnector for ScpConnector {
    type Channel = ScpChannel;

    async fn open(&self, config: &SessionConfig, port: u16) -> Result<ScpChannel, TransportFault> {
        let session = connect_ssh(config, port).await?;
        debug!("SCP connection to {}:{} open", config.host, port);
        Ok(ScpChannel {
            session,
            timeout: config.timeout,
        })
    }
}

/// An authenticated SSH connection used for SCP uploads.
pub struct ScpChannel {
    session: Handle<SshHandler>,
    timeout: Duration,
}

impl ScpChannel {
    async fn wait_ack(&self, channel: &mut Channel<Msg>) -> Result<(), TransportFault> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            let msg = tokio::time::timeout_at(deadline, channel.wait())
                .await
                .map_err(|_| TransportFault::Timeout(self.timeout))?;

            match msg {
                Some(ChannelMsg::Data { data }) => {
                    if let Some(ack) = parse_ack(&data[..]) {
                        return ack;
                    }
                }
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    return Err(TransportFault::Other(format!(
                        "scp: {}",
                        String::from_utf8_lossy(&data[..]).trim()
                    )));
                }
                Some(ChannelMsg::ExitStatus { exit_status }) if exit_status != 0 => {
                    return Err(TransportFault::Other(format!(
                        "scp exited with status {exit_status}"
                    )));
                }
                None | Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) => {
                    return Err(TransportFault::Disconnected);
                }
                Some(_) => {}
            }
        }
    }
}

/// Interpret a sink response: `0` is success, `1` and `2` carry an error
/// message. `None` for an empty read.
fn parse_ack(data: &[u8]) -> Option<Result<(), TransportFault>> {
    let (&code, message) = data.split_first()?;
    Some(match code {
        0 => Ok(()),
        1 | 2 => Err(TransportFault::Other(format!(
            "scp: {}",
            String::from_utf8_lossy(message).trim()
        ))),
        other => Err(TransportFault::Malformed(format!(
            "unexpected scp response byte {other:#04x}"
        ))),
    })
}

/// Quote an argument for a POSIX shell: wrap it in single quotes and
/// write each embedded `'` as `'\''`.
fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

impl CopyChannel for ScpChannel {
    async fn put(&mut self, local: &Path, remote: &str) -> Result<(), TransportFault> {
        let mut file = tokio::fs::File::open(local).await?;
        let size = file.metadata().await?.len();
        let name = local
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| TransportFault::Other(format!("{} has no file name", local.display())))?;

        let mut channel = self.session.channel_open_session().await?;
        channel.exec(true, format!("scp -t {}", shell_quote(remote))).await?;
        self.wait_ack(&mut channel).await?;

        let header = format!("C0644 {size} {name}\n");
        trace!("scp >> {}", header.trim_end());
        channel.data(header.as_bytes()).await?;
        self.wait_ack(&mut channel).await?;

        channel.data(&mut file).await?;
        channel.data(&b"\0"[..]).await?;
        self.wait_ack(&mut channel).await?;

        channel.eof().await?;
        debug!("copied {} bytes to {}", size, remote);
        Ok(())
    }

    async fn close(self) -> Result<(), TransportFault> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("flash:/startup.cfg"), "'flash:/startup.cfg'");
        assert_eq!(shell_quote("flash:/my file.cfg"), "'flash:/my file.cfg'");
        assert_eq!(shell_quote("a;reboot $(id)"), "'a;reboot $(id)'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_parse_ack() {
        assert!(parse_ack(b"").is_none());
        assert!(matches!(parse_ack(b"\0"), Some(Ok(()))));

        match parse_ack(b"\x01scp: flash:/file.txt: No space left on device\n") {
            Some(Err(TransportFault::Other(message))) => {
                assert_eq!(message, "scp: scp: flash:/file.txt: No space left on device");
            }
            other => panic!("unexpected ack {other:?}"),
        }
        assert!(matches!(
            parse_ack(b"\x02fatal"),
            Some(Err(TransportFault::Other(_)))
        ));
        assert!(matches!(
            parse_ack(b"C0644"),
            Some(Err(TransportFault::Malformed(_)))
        ));
    }
}
