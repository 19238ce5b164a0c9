//! Static xterm.js client.

use axum::response::Html;
use term_bridge_core::PayloadEncoding;

const ENCODING_PLACEHOLDER: &str = "__PAYLOAD_ENCODING__";

/// Render the terminal page for the configured payload encoding.
#[must_use]
pub fn index_page(encoding: PayloadEncoding) -> Html<String> {
    let name = match encoding {
        PayloadEncoding::Text => "text",
        PayloadEncoding::Base64 => "base64",
    };
    Html(INDEX_HTML.replace(ENCODING_PLACEHOLDER, name))
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>term-bridge</title>
    <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/xterm@5.3.0/css/xterm.css" />
    <script src="https://cdn.jsdelivr.net/npm/xterm@5.3.0/lib/xterm.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/xterm-addon-fit@0.8.0/lib/xterm-addon-fit.js"></script>
    <style>
        body {
            margin: 0;
            padding: 20px;
            background: #1e1e1e;
            font-family: system-ui, sans-serif;
            color: #ddd;
        }
        form { margin-bottom: 10px; }
        input { background: #2d2d2d; color: #ddd; border: 1px solid #444; padding: 4px; }
        #terminal-container {
            width: 100%;
            height: calc(100vh - 110px);
        }
        .status {
            color: #888;
            font-size: 14px;
            margin-bottom: 10px;
        }
        .connected { color: #4a4; }
        .disconnected { color: #a44; }
    </style>
</head>
<body>
    <form id="target">
        <input name="namespace" placeholder="namespace (default)" />
        <input name="pod" placeholder="pod" required />
        <input name="container" placeholder="container" />
        <button type="submit">Connect</button>
    </form>
    <div class="status" id="status">Disconnected</div>
    <div id="terminal-container"></div>

    <script>
        const ENCODING = '__PAYLOAD_ENCODING__';

        const term = new Terminal({
            cursorBlink: true,
            fontSize: 14,
            fontFamily: 'Menlo, Monaco, "Courier New", monospace',
            theme: {
                background: '#1e1e1e',
                foreground: '#d4d4d4',
            }
        });

        const fitAddon = new FitAddon.FitAddon();
        term.loadAddon(fitAddon);
        term.open(document.getElementById('terminal-container'));
        fitAddon.fit();

        const status = document.getElementById('status');
        const form = document.getElementById('target');
        const utf8 = new TextEncoder();
        let ws;

        function setStatus(text, cls) {
            status.textContent = text;
            status.className = 'status ' + cls;
        }

        function send(event, data) {
            if (ws && ws.readyState === WebSocket.OPEN) {
                ws.send(JSON.stringify(data === undefined ? { event } : { event, data }));
            }
        }

        function encode(data) {
            if (ENCODING !== 'base64') return data;
            let binary = '';
            for (const b of utf8.encode(data)) binary += String.fromCharCode(b);
            return btoa(binary);
        }

        function decode(data) {
            if (ENCODING !== 'base64') return data;
            return Uint8Array.from(atob(data), (c) => c.charCodeAt(0));
        }

        function sendSize() {
            fitAddon.fit();
            send('term:resize', { cols: term.cols, rows: term.rows });
        }

        function connect(target) {
            if (ws) ws.close();
            term.reset();
            const protocol = window.location.protocol === 'https:' ? 'wss:' : 'ws:';
            ws = new WebSocket(`${protocol}//${window.location.host}/ws`);

            ws.onclose = () => setStatus('Disconnected', 'disconnected');
            ws.onerror = (err) => console.error('WebSocket error:', err);

            ws.onmessage = (event) => {
                let msg;
                try {
                    msg = JSON.parse(event.data);
                } catch (e) {
                    console.error('Failed to parse message:', e);
                    return;
                }
                switch (msg.event) {
                    case 'open':
                        setStatus('Opening ' + target.pod + '...', '');
                        send('term:connect', target);
                        break;
                    case 'term:connected':
                        setStatus('Connected to ' + target.pod, 'connected');
                        sendSize();
                        break;
                    case 'term:stdout':
                    case 'term:stderr':
                        term.write(decode(msg.data));
                        break;
                    case 'term:error':
                        term.writeln(`\r\n[${msg.data.code}: ${msg.data.message}]`);
                        break;
                    case 'term:terminated':
                        setStatus('Session ended', 'disconnected');
                        break;
                }
            };
        }

        form.addEventListener('submit', (e) => {
            e.preventDefault();
            const fields = new FormData(form);
            connect({
                namespace: fields.get('namespace'),
                pod: fields.get('pod'),
                container: fields.get('container'),
            });
        });

        term.onData((data) => send('term:stdin', encode(data)));
        window.addEventListener('resize', sendSize);
    </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_page_encoding() {
        let Html(page) = index_page(PayloadEncoding::Base64);
        assert!(page.contains("const ENCODING = 'base64';"));
        assert!(!page.contains(ENCODING_PLACEHOLDER));

        let Html(page) = index_page(PayloadEncoding::Text);
        assert!(page.contains("const ENCODING = 'text';"));
    }
}
