// src/web_assets.rs

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>ImgFS</title>
    <script src="https://cdn.tailwindcss.com"></script>
    <style>
        body { font-family: 'Inter', sans-serif; background-color: #09090b; }
        .mono { font-family: 'JetBrains Mono', monospace; }
    </style>
</head>
<body class="text-zinc-300 min-h-screen flex flex-col selection:bg-orange-500/30">

    <header class="h-16 border-b border-zinc-800 bg-zinc-900/50 flex items-center justify-between px-6 shrink-0">
        <div class="flex items-center gap-3 select-none">
            <div class="bg-orange-600 text-white font-bold px-2 py-1 rounded text-sm">I</div>
            <span class="font-semibold tracking-tight text-lg text-white">ImgFS <span class="text-zinc-500 font-normal">Web</span></span>
        </div>
        <div id="count" class="text-xs font-medium text-zinc-500 bg-zinc-900 border border-zinc-800 px-3 py-1 rounded-full mono">0 images</div>
    </header>

    <div class="h-14 border-b border-zinc-800 bg-zinc-950/30 px-4 flex items-center gap-3 shrink-0">
        <input id="file" type="file" accept="image/jpeg" class="text-sm text-zinc-400">
        <button onclick="upload()" class="px-3 py-1.5 bg-orange-600 hover:bg-orange-500 rounded-md text-sm text-white">Upload</button>
        <button onclick="refresh()" class="px-3 py-1.5 bg-zinc-900 hover:bg-zinc-800 border border-zinc-700 rounded-md text-sm">Refresh</button>
        <span id="status" class="text-xs text-zinc-500 mono"></span>
    </div>

    <main class="flex-1 overflow-auto p-6">
        <div id="grid" class="grid grid-cols-2 sm:grid-cols-4 lg:grid-cols-6 gap-4"></div>
        <p id="empty" class="hidden text-center text-zinc-600 mt-20">&lt;&lt; empty imgFS &gt;&gt;</p>
    </main>

    <script>
        const ROOT = '/imgfs';

        function setStatus(msg) {
            document.getElementById('status').textContent = msg;
        }

        async function refresh() {
            const res = await fetch(ROOT + '/list');
            if (!res.ok) { setStatus(await res.text()); return; }
            const ids = (await res.json()).Images || [];

            document.getElementById('count').textContent = ids.length + ' image' + (ids.length === 1 ? '' : 's');
            document.getElementById('empty').classList.toggle('hidden', ids.length > 0);

            const grid = document.getElementById('grid');
            grid.innerHTML = '';
            for (const id of ids) {
                const q = encodeURIComponent(id);
                const card = document.createElement('div');
                card.className = 'bg-zinc-900 border border-zinc-800 rounded-lg overflow-hidden flex flex-col';
                card.innerHTML =
                    '<a href="' + ROOT + '/read?res=orig&img_id=' + q + '" target="_blank">' +
                    '<img class="w-full h-32 object-contain bg-zinc-950" src="' + ROOT + '/read?res=thumb&img_id=' + q + '"></a>' +
                    '<div class="p-2 flex items-center justify-between gap-2">' +
                    '<span class="truncate text-xs mono"></span>' +
                    '<span class="flex gap-2 text-xs">' +
                    '<a class="text-zinc-400 hover:text-white" target="_blank" href="' + ROOT + '/read?res=small&img_id=' + q + '">small</a>' +
                    '<button class="text-red-400 hover:text-red-300">delete</button></span></div>';
                card.querySelector('span.truncate').textContent = id;
                card.querySelector('button').onclick = () => remove(id);
                grid.appendChild(card);
            }
        }

        async function upload() {
            const input = document.getElementById('file');
            if (!input.files.length) { setStatus('pick a file first'); return; }
            const file = input.files[0];
            setStatus('uploading ' + file.name + '...');
            const res = await fetch(ROOT + '/insert?name=' + encodeURIComponent(file.name), {
                method: 'POST',
                body: await file.arrayBuffer(),
                redirect: 'manual',
            });
            setStatus(res.status >= 500 ? await res.text() : 'uploaded ' + file.name);
            input.value = '';
            refresh();
        }

        async function remove(id) {
            const res = await fetch(ROOT + '/delete?img_id=' + encodeURIComponent(id), { redirect: 'manual' });
            setStatus(res.status >= 500 ? await res.text() : 'deleted ' + id);
            refresh();
        }

        refresh();
    </script>
</body>
</html>
"#;
